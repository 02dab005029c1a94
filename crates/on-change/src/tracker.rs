//! Aggregate-change tracking.
//!
//! A bracketed call pushes a [`PendingClone`] holding a pristine snapshot
//! of the collection plus a clone that becomes the event's previous value.
//! Writes that land inside the collection while the call runs are folded
//! into the clone instead of being reported. After the call the clone is
//! popped and compared with the live collection.

use std::collections::HashSet;

use on_change_path::{Key, Path};

use crate::equal::{same_value, same_value_zero};
use crate::operation::ChangeTest;
use crate::options::Comparator;
use crate::value::{Composite, Node, NodeId, Value};

/// A nested write recorded for undo.
struct LoggedChange {
    path: Path,
    key: Key,
    previous: Value,
    /// Set when `previous` is a snapshot of a nested bracketed collection
    /// whose contents replace the live ones instead of the slot itself.
    in_place: bool,
}

pub(crate) struct PendingClone {
    path: Path,
    test: ChangeTest,
    pristine: Composite,
    clone: Node,
    cloned: HashSet<NodeId>,
    /// Clone slots already holding their pre-call value.
    written: HashSet<(NodeId, Key)>,
    changed: bool,
    log: Option<Vec<LoggedChange>>,
}

impl PendingClone {
    fn new(target: &Node, path: Path, test: ChangeTest, keep_log: bool) -> Self {
        let pristine = target.borrow().clone();
        let clone = Node::new(pristine.clone());
        let mut cloned = HashSet::new();
        cloned.insert(clone.id());
        Self {
            path,
            test,
            pristine,
            clone,
            cloned,
            written: HashSet::new(),
            changed: false,
            log: keep_log.then(Vec::new),
        }
    }

    fn covers(&self, path: &Path) -> bool {
        self.path.is_root() || path.is_sub_path(&self.path)
    }

    fn update(&mut self, full_path: &Path, key: &Key, previous: Value, in_place: bool) {
        self.changed = true;
        if key.as_name() == Some("length") {
            return;
        }
        let relative = full_path.after(&self.path);
        if let Some(log) = &mut self.log {
            log.push(LoggedChange {
                path: relative.clone(),
                key: key.clone(),
                previous: previous.clone(),
                in_place,
            });
        }
        let mut current = self.clone.clone();
        for step in relative.walk() {
            let Value::Node(child) = current.get_plain(&step) else {
                return;
            };
            current = if self.cloned.contains(&child.id()) {
                child
            } else {
                let copy = child.shallow_clone();
                self.cloned.insert(copy.id());
                current.put_plain(&step, Value::Node(copy.clone()));
                copy
            };
        }
        if !self.written.insert((current.id(), key.clone())) {
            return;
        }
        if previous.is_undefined() {
            current.remove_plain(key);
        } else {
            current.put_plain(key, previous);
        }
    }

    /// The previous value to report: the clone taken before the call.
    pub fn previous(&self) -> Value {
        Value::Node(self.clone.clone())
    }

    /// Whether the call changed `target`.
    pub fn is_changed(&self, target: &Node, equals: &Comparator) -> bool {
        self.changed || self.differs(target, equals)
    }

    fn differs(&self, target: &Node, equals: &Comparator) -> bool {
        let current = target.borrow().clone();
        match (self.test, &self.pristine, &current) {
            (ChangeTest::Certain, _, _) => true,
            (ChangeTest::Sequence, Composite::Array(before), Composite::Array(after)) => {
                before.len() != after.len()
                    || before.iter().zip(after).any(|(a, b)| !same_value(a, b))
            }
            (ChangeTest::Set, Composite::Set(before), Composite::Set(after)) => {
                before.len() != after.len()
                    || before
                        .iter()
                        .any(|member| !after.iter().any(|other| same_value_zero(member, other)))
            }
            (ChangeTest::Map, Composite::Map(before), Composite::Map(after)) => {
                before.len() != after.len()
                    || before.iter().any(|(key, value)| match after.get(key) {
                        Some(other) => !same_value(value, other),
                        None => true,
                    })
            }
            (ChangeTest::Date, Composite::Date(before), Composite::Date(after)) => {
                !equals.equals(&Value::Number(*before), &Value::Number(*after))
            }
            _ => true,
        }
    }

    /// Restores `target` to its state before the call, then replays the
    /// nested-change log backwards.
    pub fn undo(&self, target: &Node) {
        match &self.pristine {
            Composite::Object(_) => {}
            pristine => *target.borrow_mut() = pristine.clone(),
        }
        let Some(log) = &self.log else {
            return;
        };
        for change in log.iter().rev() {
            let Some(parent) = target.resolve_plain(&change.path) else {
                continue;
            };
            if change.in_place {
                if let (Value::Node(live), Value::Node(snapshot)) =
                    (parent.get_plain(&change.key), &change.previous)
                {
                    if !live.ptr_eq(snapshot) {
                        let contents = snapshot.borrow().clone();
                        *live.borrow_mut() = contents;
                    }
                    continue;
                }
            }
            if change.previous.is_undefined() {
                parent.remove_plain(&change.key);
            } else {
                parent.put_plain(&change.key, change.previous.clone());
            }
        }
    }
}

/// The stack of in-flight brackets.
pub(crate) struct Tracker {
    stack: Vec<PendingClone>,
    keep_log: bool,
}

impl Tracker {
    /// `keep_log` records nested writes so they can be undone; only needed
    /// when a validator may reject the bracket.
    pub fn new(keep_log: bool) -> Self {
        Self {
            stack: Vec::new(),
            keep_log,
        }
    }

    pub fn start(&mut self, target: &Node, path: Path, test: ChangeTest) {
        self.stack
            .push(PendingClone::new(target, path, test, self.keep_log));
    }

    pub fn is_cloning(&self) -> bool {
        !self.stack.is_empty()
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True if a change at `path` lies inside the innermost bracket.
    pub fn is_part_of_clone(&self, path: &Path) -> bool {
        self.stack.last().is_some_and(|pending| pending.covers(path))
    }

    /// Folds a change at `full_path.key` into the innermost clone.
    pub fn update(&mut self, full_path: &Path, key: &Key, previous: Value) {
        if let Some(pending) = self.stack.last_mut() {
            pending.update(full_path, key, previous, false);
        }
    }

    /// Folds a finished nested bracket at `path` into the innermost clone.
    /// Returns `false` if `path` lies outside it.
    pub fn fold_nested(&mut self, path: &Path, snapshot: Value) -> bool {
        let Some(pending) = self.stack.last_mut() else {
            return false;
        };
        if !pending.covers(path) {
            return false;
        }
        if *path == pending.path {
            // Same collection: the outer snapshot already predates it.
            pending.changed = true;
        } else {
            pending.update(&path.initial(), &path.last(), snapshot, true);
        }
        true
    }

    pub fn stop(&mut self) -> Option<PendingClone> {
        self.stack.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use on_change_path::PathForm;
    use serde_json::json;

    fn node(json: serde_json::Value) -> Node {
        Value::from(json).as_node().cloned().unwrap()
    }

    fn path(text: &str) -> Path {
        Path::parse(PathForm::Joined, text)
    }

    #[test]
    fn test_stack_discipline() {
        let list = node(json!([1, 2]));
        let mut tracker = Tracker::new(false);
        assert!(!tracker.is_cloning());
        tracker.start(&list, path("list"), ChangeTest::Sequence);
        tracker.start(&list, path("list"), ChangeTest::Certain);
        assert_eq!(tracker.depth(), 2);
        assert!(tracker.stop().is_some());
        assert!(tracker.is_cloning());
        assert!(tracker.stop().is_some());
        assert!(tracker.stop().is_none());
    }

    #[test]
    fn test_part_of_clone() {
        let list = node(json!([]));
        let mut tracker = Tracker::new(false);
        tracker.start(&list, path("a.list"), ChangeTest::Sequence);
        assert!(tracker.is_part_of_clone(&path("a.list")));
        assert!(tracker.is_part_of_clone(&path("a.list.0")));
        assert!(!tracker.is_part_of_clone(&path("a.lists")));
        assert!(!tracker.is_part_of_clone(&path("b")));
        tracker.stop();

        tracker.start(&list, path(""), ChangeTest::Sequence);
        assert!(tracker.is_part_of_clone(&path("anything")));
    }

    #[test]
    fn test_sequence_change_test() {
        let list = node(json!([3, 1, 2]));
        let equals = Comparator::default();
        let mut tracker = Tracker::new(false);

        tracker.start(&list, path(""), ChangeTest::Sequence);
        let pending = tracker.stop().unwrap();
        assert!(!pending.is_changed(&list, &equals));

        tracker.start(&list, path(""), ChangeTest::Sequence);
        list.put_plain(&Key::Index(0), Value::from(0));
        let pending = tracker.stop().unwrap();
        assert!(pending.is_changed(&list, &equals));
        assert_eq!(pending.previous().to_json(), json!([3, 1, 2]));

        pending.undo(&list);
        assert_eq!(Value::Node(list).to_json(), json!([3, 1, 2]));
    }

    #[test]
    fn test_map_distinguishes_absent_from_undefined() {
        let map = Node::map([("a", Value::Undefined)]);
        let equals = Comparator::default();
        let mut tracker = Tracker::new(false);
        tracker.start(&map, path(""), ChangeTest::Map);
        map.remove_plain(&Key::from("a"));
        map.put_plain(&Key::from("b"), Value::Undefined);
        let pending = tracker.stop().unwrap();
        assert!(pending.is_changed(&map, &equals));
    }

    #[test]
    fn test_set_change_test_ignores_order() {
        let set = Node::set([Value::from(1), Value::from(2)]);
        let equals = Comparator::default();
        let mut tracker = Tracker::new(false);
        tracker.start(&set, path(""), ChangeTest::Set);
        *set.borrow_mut() = Composite::Set(vec![Value::from(2), Value::from(1)]);
        let pending = tracker.stop().unwrap();
        assert!(!pending.is_changed(&set, &equals));
    }

    #[test]
    fn test_date_uses_comparator() {
        let date = Node::date(1000.0);
        let mut tracker = Tracker::new(false);
        tracker.start(&date, path(""), ChangeTest::Date);
        *date.borrow_mut() = Composite::Date(1500.0);
        let pending = tracker.stop().unwrap();
        assert!(pending.is_changed(&date, &Comparator::default()));
        let coarse = Comparator::new(|a, b| {
            let second = |v: &Value| (v.as_f64().unwrap_or(f64::NAN) / 1000.0).floor();
            second(a) == second(b)
        });
        assert!(!pending.is_changed(&date, &coarse));
        pending.undo(&date);
        assert_eq!(date.time(), Some(1000.0));
    }

    #[test]
    fn test_nested_update_deepens_clone_once() {
        let list = node(json!([{"n": 1}, {"n": 2}]));
        let member = list.get_plain(&Key::Index(0)).as_node().cloned().unwrap();
        let mut tracker = Tracker::new(true);
        tracker.start(&list, path("list"), ChangeTest::Sequence);

        member.put_plain(&Key::from("n"), Value::from(10));
        tracker.update(&path("list.0"), &Key::from("n"), Value::from(1));
        member.put_plain(&Key::from("n"), Value::from(20));
        tracker.update(&path("list.0"), &Key::from("n"), Value::from(10));

        let pending = tracker.stop().unwrap();
        assert!(pending.is_changed(&list, &Comparator::default()));
        // The clone holds the value from before the first write.
        assert_eq!(pending.previous().to_json(), json!([{"n": 1}, {"n": 2}]));

        pending.undo(&list);
        assert_eq!(Value::Node(list.clone()).to_json(), json!([{"n": 1}, {"n": 2}]));
        assert!(list.get_plain(&Key::Index(0)).as_node().unwrap().ptr_eq(&member));
    }

    #[test]
    fn test_fold_nested_bracket() {
        let outer = node(json!({"inner": [1, 2]}));
        let inner = outer.get_plain(&Key::from("inner")).as_node().cloned().unwrap();
        let snapshot = Node::array(vec![Value::from(1), Value::from(2)]);
        let mut tracker = Tracker::new(true);
        tracker.start(&outer, path("box"), ChangeTest::Certain);
        inner.put_plain(&Key::Index(0), Value::from(9));
        assert!(tracker.fold_nested(&path("box.inner"), Value::Node(snapshot)));
        assert!(!tracker.fold_nested(&path("other"), Value::Undefined));
        assert!(tracker.fold_nested(&path("box"), Value::Undefined));

        let pending = tracker.stop().unwrap();
        assert_eq!(pending.previous().to_json(), json!({"inner": [1, 2]}));
        pending.undo(&outer);
        assert_eq!(Value::Node(outer.clone()).to_json(), json!({"inner": [1, 2]}));
        assert!(outer.get_plain(&Key::from("inner")).as_node().unwrap().ptr_eq(&inner));
    }

    #[test]
    fn test_length_writes_only_flag_change() {
        let list = node(json!([1]));
        let mut tracker = Tracker::new(true);
        tracker.start(&list, path(""), ChangeTest::Sequence);
        tracker.update(&path(""), &Key::length(), Value::from(1));
        let pending = tracker.stop().unwrap();
        assert!(pending.is_changed(&list, &Comparator::default()));
        assert_eq!(pending.previous().to_json(), json!([1]));
    }
}
