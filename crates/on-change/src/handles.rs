//! Typed views over wrappers.
//!
//! Each handle fixes the kind of the wrapped node and exposes its
//! operations as methods. Everything goes through [`Observed::invoke`], so
//! handles report changes exactly like untyped calls.

use on_change_path::Key;

use crate::builtins;
use crate::error::Error;
use crate::observe::Observed;
use crate::operation::Operation;
use crate::value::{Function, Kind, Value};

pub struct ObservedObject {
    inner: Observed,
}

pub struct ObservedArray {
    inner: Observed,
}

pub struct ObservedSet {
    inner: Observed,
}

/// Map keys are [`Key`]s: names, indices and symbols. Composite values
/// cannot be keys; handing one to `invoke("set", ..)` on the untyped
/// wrapper fails with [`Error::UnsupportedKey`].
pub struct ObservedMap {
    inner: Observed,
}

pub struct ObservedDate {
    inner: Observed,
}

impl Observed {
    fn expect_kind(&self, expected: Kind) -> Result<(), Error> {
        let found = self.target().kind();
        if found == expected {
            Ok(())
        } else {
            Err(Error::WrongKind {
                expected: expected.name(),
                found: found.name(),
            })
        }
    }

    pub fn as_object(self) -> Result<ObservedObject, Error> {
        self.expect_kind(Kind::Object)?;
        Ok(ObservedObject { inner: self })
    }

    pub fn as_array(self) -> Result<ObservedArray, Error> {
        self.expect_kind(Kind::Array)?;
        Ok(ObservedArray { inner: self })
    }

    pub fn as_set(self) -> Result<ObservedSet, Error> {
        self.expect_kind(Kind::Set)?;
        Ok(ObservedSet { inner: self })
    }

    pub fn as_map(self) -> Result<ObservedMap, Error> {
        self.expect_kind(Kind::Map)?;
        Ok(ObservedMap { inner: self })
    }

    pub fn as_date(self) -> Result<ObservedDate, Error> {
        self.expect_kind(Kind::Date)?;
        Ok(ObservedDate { inner: self })
    }
}

impl Value {
    /// The wrapper inside this value, for use with the typed views.
    pub fn observed(&self) -> Result<Observed, Error> {
        self.as_observed().cloned().ok_or(Error::NotAnObject)
    }
}

fn to_bool(value: Value) -> bool {
    value.as_bool().unwrap_or(false)
}

fn to_index(value: Value) -> Option<usize> {
    value
        .as_f64()
        .filter(|n| *n >= 0.0)
        .map(|n| n as usize)
}

fn to_usize(value: Value) -> usize {
    to_index(value).unwrap_or(0)
}

macro_rules! handle_common {
    ($handle:ty) => {
        impl $handle {
            pub fn observed(&self) -> &Observed {
                &self.inner
            }

            pub fn into_value(self) -> Value {
                Value::Observed(self.inner)
            }

            pub fn to_json(&self) -> serde_json::Value {
                Value::Observed(self.inner.clone()).to_json()
            }
        }
    };
}

handle_common!(ObservedObject);
handle_common!(ObservedArray);
handle_common!(ObservedSet);
handle_common!(ObservedMap);
handle_common!(ObservedDate);

impl ObservedObject {
    pub fn get(&self, key: impl Into<Key>) -> Result<Value, Error> {
        self.inner.get(key)
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool, Error> {
        self.inner.set(key, value)
    }

    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, Error> {
        self.inner.delete(key)
    }

    pub fn has_own_property(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let key = Value::from(key.into());
        self.inner
            .invoke(Operation::HasOwnProperty.name(), &[key])
            .map(to_bool)
    }

    /// Calls a function-valued property with the wrapper as `this`.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value, Error> {
        self.inner.invoke(method, args)
    }
}

impl ObservedArray {
    pub fn len(&self) -> usize {
        self.inner.target().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Result<Value, Error> {
        self.inner.get(index)
    }

    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<bool, Error> {
        self.inner.set(index, value)
    }

    /// Returns the new length.
    pub fn append(&self, items: &[Value]) -> Result<usize, Error> {
        self.inner.invoke(Operation::Append.name(), items).map(to_usize)
    }

    pub fn remove_last(&self) -> Result<Value, Error> {
        self.inner.invoke(Operation::RemoveLast.name(), &[])
    }

    pub fn remove_first(&self) -> Result<Value, Error> {
        self.inner.invoke(Operation::RemoveFirst.name(), &[])
    }

    /// Returns the new length.
    pub fn prepend(&self, items: &[Value]) -> Result<usize, Error> {
        self.inner.invoke(Operation::Prepend.name(), items).map(to_usize)
    }

    pub fn reverse(&self) -> Result<(), Error> {
        self.inner.invoke(Operation::Reverse.name(), &[]).map(drop)
    }

    /// Sorts in place, by display string unless `compare` is given.
    pub fn sort(&self, compare: Option<Function>) -> Result<(), Error> {
        let args: Vec<Value> = compare.into_iter().map(Value::Function).collect();
        self.inner.invoke(Operation::Sort.name(), &args).map(drop)
    }

    /// Removes `delete_count` elements at `start`, inserts `items`, and
    /// returns the removed elements.
    pub fn splice(&self, start: i64, delete_count: usize, items: &[Value]) -> Result<Value, Error> {
        let mut args = vec![Value::from(start), Value::from(delete_count)];
        args.extend_from_slice(items);
        self.inner.invoke(Operation::Splice.name(), &args)
    }

    pub fn fill(&self, value: impl Into<Value>) -> Result<(), Error> {
        self.inner
            .invoke(Operation::Fill.name(), &[value.into()])
            .map(drop)
    }

    pub fn copy_within(&self, target: i64, start: i64) -> Result<(), Error> {
        self.inner
            .invoke(Operation::CopyWithin.name(), &[Value::from(target), Value::from(start)])
            .map(drop)
    }

    pub fn flatten(&self, depth: Option<f64>) -> Result<(), Error> {
        let args: Vec<Value> = depth.into_iter().map(Value::from).collect();
        self.inner.invoke(Operation::Flatten.name(), &args).map(drop)
    }

    pub fn includes(&self, item: &Value) -> Result<bool, Error> {
        self.inner
            .invoke(Operation::Includes.name(), std::slice::from_ref(item))
            .map(to_bool)
    }

    pub fn index_of(&self, item: &Value) -> Result<Option<usize>, Error> {
        self.inner
            .invoke(Operation::IndexOf.name(), std::slice::from_ref(item))
            .map(to_index)
    }

    pub fn last_index_of(&self, item: &Value) -> Result<Option<usize>, Error> {
        self.inner
            .invoke(Operation::LastIndexOf.name(), std::slice::from_ref(item))
            .map(to_index)
    }

    pub fn join(&self, separator: &str) -> Result<String, Error> {
        let joined = self
            .inner
            .invoke(Operation::Join.name(), &[Value::from(separator)])?;
        Ok(joined.as_str().unwrap_or_default().to_owned())
    }

    /// Lazily wraps each element as it is visited.
    pub fn iter(&self) -> ObservedIter {
        ObservedIter::new(self.inner.clone(), Operation::Values)
    }
}

impl ObservedSet {
    pub fn size(&self) -> usize {
        self.inner.target().len()
    }

    pub fn add(&self, member: impl Into<Value>) -> Result<(), Error> {
        self.inner
            .invoke(Operation::Add.name(), &[member.into()])
            .map(drop)
    }

    pub fn has(&self, member: &Value) -> Result<bool, Error> {
        self.inner
            .invoke(Operation::Has.name(), std::slice::from_ref(member))
            .map(to_bool)
    }

    pub fn delete(&self, member: &Value) -> Result<bool, Error> {
        self.inner
            .invoke(Operation::Delete.name(), std::slice::from_ref(member))
            .map(to_bool)
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.inner.invoke(Operation::Clear.name(), &[]).map(drop)
    }

    /// Calls `callback(member, member, set)` for every member. Members are
    /// wrapped, and writes made through them are folded into a single
    /// change of the set.
    pub fn for_each(&self, callback: Function) -> Result<(), Error> {
        self.inner
            .invoke(Operation::ForEach.name(), &[Value::Function(callback)])
            .map(drop)
    }

    pub fn values(&self) -> ObservedIter {
        ObservedIter::new(self.inner.clone(), Operation::Values)
    }

    pub fn entries(&self) -> ObservedEntries {
        ObservedEntries::new(self.inner.clone())
    }
}

impl ObservedMap {
    pub fn size(&self) -> usize {
        self.inner.target().len()
    }

    pub fn get(&self, key: impl Into<Key>) -> Result<Value, Error> {
        self.inner
            .invoke(Operation::Get.name(), &[Value::from(key.into())])
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), Error> {
        self.inner
            .invoke(Operation::Set.name(), &[Value::from(key.into()), value.into()])
            .map(drop)
    }

    pub fn has(&self, key: impl Into<Key>) -> Result<bool, Error> {
        self.inner
            .invoke(Operation::Has.name(), &[Value::from(key.into())])
            .map(to_bool)
    }

    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, Error> {
        self.inner
            .invoke(Operation::Delete.name(), &[Value::from(key.into())])
            .map(to_bool)
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.inner.invoke(Operation::Clear.name(), &[]).map(drop)
    }

    /// Calls `callback(value, key, map)` for every entry, with values
    /// wrapped.
    pub fn for_each(&self, callback: Function) -> Result<(), Error> {
        self.inner
            .invoke(Operation::ForEach.name(), &[Value::Function(callback)])
            .map(drop)
    }

    pub fn keys(&self) -> ObservedIter {
        ObservedIter::new(self.inner.clone(), Operation::Keys)
    }

    pub fn values(&self) -> ObservedIter {
        ObservedIter::new(self.inner.clone(), Operation::Values)
    }

    pub fn entries(&self) -> ObservedEntries {
        ObservedEntries::new(self.inner.clone())
    }
}

impl ObservedDate {
    pub fn time(&self) -> f64 {
        self.inner.target().time().unwrap_or(f64::NAN)
    }

    /// Returns the new timestamp.
    pub fn set_time(&self, ms: f64) -> Result<f64, Error> {
        self.set(Operation::SetTime, &[Value::from(ms)])
    }

    pub fn set_utc_hours(&self, hours: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcHours, &[Value::from(hours)])
    }

    pub fn set_utc_minutes(&self, minutes: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcMinutes, &[Value::from(minutes)])
    }

    pub fn set_utc_seconds(&self, seconds: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcSeconds, &[Value::from(seconds)])
    }

    pub fn set_utc_milliseconds(&self, millis: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcMilliseconds, &[Value::from(millis)])
    }

    /// Day of the month, one-based. Out-of-range days roll over.
    pub fn set_utc_date(&self, day: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcDate, &[Value::from(day)])
    }

    /// Zero-based month, optionally with the day of the month.
    pub fn set_utc_month(&self, month: f64, day: Option<f64>) -> Result<f64, Error> {
        let mut args = vec![Value::from(month)];
        args.extend(day.map(Value::from));
        self.set(Operation::SetUtcMonth, &args)
    }

    /// Also revives an invalid date, starting from the epoch.
    pub fn set_utc_full_year(&self, year: f64) -> Result<f64, Error> {
        self.set(Operation::SetUtcFullYear, &[Value::from(year)])
    }

    fn set(&self, op: Operation, args: &[Value]) -> Result<f64, Error> {
        let time = self.inner.invoke(op.name(), args)?;
        Ok(time.as_f64().unwrap_or(f64::NAN))
    }
}

// ── Iterators ─────────────────────────────────────────────────────────────

/// Walks a snapshot of a collection's members, wrapping each one only when
/// it is reached.
pub struct ObservedIter {
    source: Observed,
    op: Operation,
    members: std::vec::IntoIter<(Key, Value)>,
}

impl ObservedIter {
    fn new(source: Observed, op: Operation) -> Self {
        let members = builtins::members(&source.target()).into_iter();
        Self {
            source,
            op,
            members,
        }
    }
}

impl Iterator for ObservedIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (key, value) = self.members.next()?;
        Some(match (self.op, self.source.target().kind()) {
            (Operation::Keys, Kind::Map) => Value::from(key),
            _ => self.source.wrap_member(&key, value),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.members.size_hint()
    }
}

impl ExactSizeIterator for ObservedIter {}

/// Like [`ObservedIter`] but yields `(key, value)` pairs. Set entries pair
/// each member with itself.
pub struct ObservedEntries {
    source: Observed,
    members: std::vec::IntoIter<(Key, Value)>,
}

impl ObservedEntries {
    fn new(source: Observed) -> Self {
        let members = builtins::members(&source.target()).into_iter();
        Self { source, members }
    }
}

impl Iterator for ObservedEntries {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        let (key, value) = self.members.next()?;
        let wrapped = self.source.wrap_member(&key, value);
        Some(match self.source.target().kind() {
            Kind::Map => (Value::from(key), wrapped),
            _ => (wrapped.clone(), wrapped),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.members.size_hint()
    }
}

impl ExactSizeIterator for ObservedEntries {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::observe;
    use crate::options::Options;
    use serde_json::json;

    #[test]
    fn test_kind_checks() {
        let state = observe(json!({"list": [1]}), |_| {}, Options::default());
        let observed = state.observed().unwrap();
        assert!(matches!(
            observed.clone().as_array(),
            Err(Error::WrongKind {
                expected: "array",
                found: "object"
            })
        ));
        assert!(observed.as_object().is_ok());
        let list = state.get("list").unwrap().observed().unwrap().as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert!(Value::from(1).observed().is_err());
    }

    #[test]
    fn test_array_handle() {
        let state = observe(json!({"list": [3, 1, 2]}), |_| {}, Options::default());
        let list = state.get("list").unwrap().observed().unwrap().as_array().unwrap();
        assert_eq!(list.append(&[Value::from(4)]).unwrap(), 4);
        list.sort(None).unwrap();
        assert_eq!(list.to_json(), json!([1, 2, 3, 4]));
        assert_eq!(list.index_of(&Value::from(3)).unwrap(), Some(2));
        assert_eq!(list.index_of(&Value::from(9)).unwrap(), None);
        assert_eq!(list.join("-").unwrap(), "1-2-3-4");
        let removed = list.splice(1, 2, &[]).unwrap();
        assert_eq!(removed.to_json(), json!([2, 3]));
        assert_eq!(list.to_json(), json!([1, 4]));
    }

    #[test]
    fn test_set_and_date_handles() {
        use crate::value::Node;
        use std::cell::Cell;
        use std::rc::Rc;

        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let state = observe(
            Node::object_from([
                ("tags", Value::Node(Node::set([Value::from("a")]))),
                ("when", Value::Node(Node::date(0.0))),
            ]),
            move |_| seen.set(seen.get() + 1),
            Options::default(),
        );
        let tags = state.get("tags").unwrap().observed().unwrap().as_set().unwrap();
        tags.add("a").unwrap();
        assert_eq!(count.get(), 0);
        tags.add("b").unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(tags.size(), 2);
        assert!(tags.has(&Value::from("b")).unwrap());

        let when = state.get("when").unwrap().observed().unwrap().as_date().unwrap();
        assert_eq!(when.set_time(2_000.0).unwrap(), 2_000.0);
        assert_eq!(when.time(), 2_000.0);
        assert_eq!(count.get(), 2);
        assert_eq!(when.set_utc_date(1.0).unwrap(), 2_000.0);
        assert_eq!(count.get(), 2);
        assert_eq!(when.set_utc_month(0.0, Some(2.0)).unwrap(), 86_402_000.0);
        assert_eq!(when.set_utc_full_year(1971.0).unwrap(), 31_622_402_000.0);
        assert_eq!(count.get(), 4);
    }

    #[test]
    fn test_map_keys_must_be_keys() {
        let state = observe(
            crate::value::Node::object_from([("m", Value::Node(crate::value::Node::map([("a", 1)])))]),
            |_| {},
            Options::default(),
        );
        let m = state.get("m").unwrap();
        let composite = Value::from(json!({"k": 1}));
        assert!(matches!(
            m.invoke("set", &[composite, Value::from(2)]),
            Err(Error::UnsupportedKey { kind: "map", .. })
        ));
        let typed = m.observed().unwrap().as_map().unwrap();
        typed.set("b", 2).unwrap();
        assert_eq!(typed.get("b").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_lazy_iteration_wraps_members() {
        let state = observe(
            Value::Node(crate::value::Node::object_from([(
                "tags",
                Value::Node(crate::value::Node::map([("a", Value::from(json!({"n": 1})))])),
            )])),
            |_| {},
            Options::default(),
        );
        let tags = state.get("tags").unwrap().observed().unwrap().as_map().unwrap();
        let mut values = tags.values();
        assert_eq!(values.len(), 1);
        let first = values.next().unwrap();
        let first = first.as_observed().unwrap();
        assert_eq!(first.path().unwrap().to_string(), "tags.a");
        let keys: Vec<Value> = tags.keys().collect();
        assert_eq!(keys[0].as_str(), Some("a"));
        let (key, value) = tags.entries().next().unwrap();
        assert_eq!(key.as_str(), Some("a"));
        assert!(value.as_observed().unwrap().ptr_eq(first));
    }
}
