//! `on-change-trace`: print the change events a script of mutations
//! produces.
//!
//! Usage:
//!   on-change-trace [--options '<json>'] <step>...
//!
//! The document is read from stdin. Steps are `set <path> <json>`,
//! `delete <path>` and `call <path> <operation> [json-args...]`. One JSON
//! line is written per event. Set `RUST_LOG=on_change=trace` to see the
//! observer's own logging on stderr.

use std::io::{self, Read, Write};

use on_change::cli::run;

fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Usage: on-change-trace [--options '<json>'] <step>...");
        std::process::exit(1);
    }

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match run(buf.trim(), &args) {
        Ok(out) => {
            if let Err(e) = io::stdout().write_all(out.as_bytes()) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
