//! A small reading-list store: one observed state, a listener that logs
//! every change and a validator that refuses duplicate favorites.
//!
//! Run with `cargo run -p on-change --example favorites`.

use std::cell::RefCell;
use std::rc::Rc;

use on_change::{observe, unsubscribe, Change, Details, Error, Options, Value};
use serde_json::json;

fn main() -> Result<(), Error> {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = log.clone();

    let options = Options::default()
        .details(Details::Only(vec!["append".into(), "splice".into()]))
        .ignore_underscores(true)
        .on_validate(|change: &Change| {
            // A favorites list never holds the same title twice.
            if change.path.to_string() != "favorites" {
                return true;
            }
            let Some(node) = change.value.target_node() else {
                return true;
            };
            let titles: Vec<String> = (0..node.len())
                .filter_map(|i| Value::Node(node.clone()).get(i).ok())
                .map(|title| title.to_display_string())
                .collect();
            let mut unique = titles.clone();
            unique.sort();
            unique.dedup();
            unique.len() == titles.len()
        });

    let state = observe(
        json!({
            "query": "",
            "results": [],
            "favorites": ["Dune"],
            "_lastFetch": 0,
        }),
        move |change: &Change| {
            let name = change
                .details
                .as_ref()
                .map(|details| format!(" ({})", details.name))
                .unwrap_or_default();
            sink.borrow_mut().push(format!(
                "{}{}: {} -> {}",
                change.path,
                name,
                change.previous.to_json(),
                change.value.to_json()
            ));
        },
        options,
    );

    state.set("query", "herbert")?;
    state.set("results", json!([{"title": "Dune"}, {"title": "Children of Dune"}]))?;
    state.set("_lastFetch", 1_700_000_000)?;

    let favorites = state.get("favorites")?;
    favorites.invoke("append", &[Value::from("Children of Dune")])?;
    // Refused by the validator: already present.
    favorites.invoke("append", &[Value::from("Dune")])?;
    favorites.invoke("splice", &[Value::from(0), Value::from(1)])?;

    state.get("results")?.get(0usize)?.set("title", "Dune Messiah")?;

    let raw = unsubscribe(&state);
    raw.set("query", "asimov")?;

    for line in log.borrow().iter() {
        println!("{line}");
    }
    println!("final: {}", raw.to_json());
    Ok(())
}
