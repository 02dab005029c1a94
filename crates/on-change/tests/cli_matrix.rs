use std::io::Write;
use std::process::{Command, Stdio};

use on_change::cli::{run, CliError};
use serde_json::{json, Value};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn lines(out: &str) -> Vec<Value> {
    out.lines()
        .map(|line| serde_json::from_str(line).expect("each line must be JSON"))
        .collect()
}

#[test]
fn cli_script_matrix() {
    let doc = r#"{"user": {"name": "ada", "tags": ["b", "a"]}, "list": [3, 1, 2]}"#;
    let cases: Vec<(Vec<&str>, Vec<Value>)> = vec![
        (
            vec!["set", "user.name", "\"grace\""],
            vec![json!({"path": "user.name", "value": "grace", "previous": "ada"})],
        ),
        (
            vec!["delete", "user.tags"],
            vec![json!({"path": "user.tags", "value": null, "previous": ["b", "a"]})],
        ),
        (
            vec!["call", "list", "sort"],
            vec![json!({"path": "list", "value": [1, 2, 3], "previous": [3, 1, 2]})],
        ),
        (
            vec!["call", "list", "splice", "0", "1", "call", "user.tags", "sort"],
            vec![
                json!({"path": "list", "value": [1, 2], "previous": [3, 1, 2]}),
                json!({"path": "user.tags", "value": ["a", "b"], "previous": ["b", "a"]}),
            ],
        ),
        (vec!["set", "user.name", "\"ada\""], vec![]),
        (vec!["call", "list", "includes", "3"], vec![]),
    ];

    for (script, expected) in cases {
        let out = run(doc, &args(&script)).unwrap();
        assert_eq!(lines(&out), expected, "{script:?}");
    }
}

#[test]
fn cli_options_matrix() {
    let doc = r#"{"a": {"b": 1}, "list": [1]}"#;
    let out = run(
        doc,
        &args(&["--options", r#"{"pathAsArray": true}"#, "set", "a.b", "2"]),
    )
    .unwrap();
    assert_eq!(lines(&out), vec![json!({"path": ["a", "b"], "value": 2, "previous": 1})]);

    let out = run(
        doc,
        &args(&["--options", r#"{"details": ["append"]}"#, "call", "list", "append", "2"]),
    )
    .unwrap();
    assert_eq!(
        lines(&out)[0]["details"],
        json!({"name": "append", "args": [2], "result": 2})
    );

    let out = run(doc, &args(&["--options", r#"{"isShallow": true}"#, "set", "a.b", "2"])).unwrap();
    assert_eq!(out, "");
}

#[test]
fn cli_error_matrix() {
    let doc = r#"{"a": 1, "list": [1]}"#;
    let cases: Vec<Vec<&str>> = vec![
        vec!["set", "a"],
        vec!["jump", "a"],
        vec!["set", "missing.deep", "1"],
        vec!["call", "list", "teleport"],
        vec!["--options"],
        vec!["--options", "{", "set", "a", "1"],
    ];
    for script in cases {
        assert!(run(doc, &args(&script)).is_err(), "{script:?}");
    }
    assert!(matches!(run("[", &[]), Err(CliError::Json(_))));
    assert!(matches!(
        run(doc, &args(&["call", "list", "teleport"])),
        Err(CliError::Engine(on_change::Error::UnsupportedOperation { .. }))
    ));
    for index in ["18446744073709551615", "1099511627776"] {
        let path = format!("list.{index}");
        assert!(matches!(
            run(doc, &args(&["set", &path, "1"])),
            Err(CliError::Engine(on_change::Error::UnsupportedKey { .. }))
        ));
    }
}

#[test]
fn cli_binary_prints_one_line_per_event() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_on-change-trace"))
        .args(["set", "a", "2", "call", "list", "append", "5"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary must start");
    child
        .stdin
        .take()
        .expect("stdin must be piped")
        .write_all(br#"{"a": 1, "list": []}"#)
        .expect("stdin write must succeed");
    let output = child.wait_with_output().expect("binary must finish");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout must be UTF-8");
    assert_eq!(
        lines(&stdout),
        vec![
            json!({"path": "a", "value": 2, "previous": 1}),
            json!({"path": "list", "value": [5], "previous": []}),
        ]
    );
}

#[test]
fn cli_binary_reports_errors_on_stderr() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_on-change-trace"))
        .args(["set", "a", "{"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary must start");
    child
        .stdin
        .take()
        .expect("stdin must be piped")
        .write_all(b"{}")
        .expect("stdin write must succeed");
    let output = child.wait_with_output().expect("binary must finish");
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}
