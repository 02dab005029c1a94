mod common;

use common::observed;
use on_change::{observe, Node, Options, Path, Value};
use serde_json::json;

fn aliased_root() -> Node {
    let shared = Value::from(json!({"n": 0}));
    Node::object_from([("a", shared.clone()), ("b", shared)])
}

#[test]
fn one_event_per_live_alias() {
    let events = common::Events::default();
    let state = observe(aliased_root(), events.listener(), Options::default());
    let via_a = state.get("a").unwrap();
    let via_b = state.get("b").unwrap();
    assert!(via_a.as_observed().unwrap().ptr_eq(via_b.as_observed().unwrap()));
    assert_eq!(
        via_a.as_observed().unwrap().all_paths(),
        vec![Path::from("a"), Path::from("b")]
    );

    via_a.set("n", 1).unwrap();
    assert_eq!(events.paths(), vec!["a.n", "b.n"]);

    events.clear();
    state.delete("b").unwrap();
    assert_eq!(events.paths(), vec!["b"]);

    events.clear();
    via_a.set("n", 2).unwrap();
    assert_eq!(events.paths(), vec!["a.n"]);
    assert_eq!(via_a.as_observed().unwrap().path(), Some(Path::from("a")));
}

#[test]
fn alias_reached_by_reassignment_stays_single_until_read() {
    let (state, events) = observed(json!({"a": {"n": 0}}), Options::default());
    let a = state.get("a").unwrap();
    state.set("b", a.clone()).unwrap();
    events.clear();

    a.set("n", 1).unwrap();
    assert_eq!(events.paths(), vec!["a.n"]);

    state.get("b").unwrap();
    events.clear();
    a.set("n", 2).unwrap();
    assert_eq!(events.paths(), vec!["a.n", "b.n"]);
}

#[test]
fn aggregate_changes_fan_out_too() {
    let shared = Value::from(json!([2, 1]));
    let root = Node::object_from([("x", shared.clone()), ("y", shared)]);
    let events = common::Events::default();
    let state = observe(root, events.listener(), Options::default());
    state.get("x").unwrap();
    let list = state.get("y").unwrap();
    list.invoke("sort", &[]).unwrap();
    assert_eq!(events.paths(), vec!["x", "y"]);
}

#[test]
fn fan_out_can_be_switched_off() {
    let events = common::Events::default();
    let state = observe(
        aliased_root(),
        events.listener(),
        Options::default().notify_aliases(false),
    );
    state.get("a").unwrap();
    let via_b = state.get("b").unwrap();
    via_b.set("n", 1).unwrap();
    assert_eq!(events.paths(), vec!["b.n"]);
}

#[test]
fn reads_use_the_navigation_path() {
    let events = common::Events::default();
    let state = observe(aliased_root(), events.listener(), Options::default());
    state.get("a").unwrap();
    state.get("b").unwrap();
    let via_a = state.get("a").unwrap();
    assert_eq!(via_a.as_observed().unwrap().path(), Some(Path::from("a")));
}

#[test]
fn moved_value_reports_at_its_new_place() {
    let (state, events) = observed(json!({"from": {"n": 0}, "to": null}), Options::default());
    let value = state.get("from").unwrap();
    state.set("to", value.clone()).unwrap();
    state.delete("from").unwrap();
    let moved = state.get("to").unwrap();
    events.clear();

    moved.set("n", 1).unwrap();
    assert_eq!(events.paths(), vec!["to.n"]);
}
