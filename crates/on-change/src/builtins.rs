//! Raw execution of the built-in operations.
//!
//! Nothing here knows about observation. The observer calls [`execute`]
//! inside a change bracket and passes a `wrap` hook so members handed to
//! callbacks or produced by iterators come back wrapped.

use std::cmp::Ordering;

use on_change_path::Key;

use crate::equal::{same_value_zero, strict_equals};
use crate::error::Error;
use crate::operation::{classify, Operation};
use crate::value::{Composite, Kind, Node, NodeId, Value};

/// Maps a member and the key it lives at to what callers should see.
pub(crate) type Wrap<'a> = &'a dyn Fn(Value, &Key) -> Value;

const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_SECOND: f64 = 1_000.0;

/// Runs `name` on an unobserved node: a built-in operation if the kind
/// handles it, otherwise a function-valued property.
pub(crate) fn invoke_raw(node: &Node, name: &str, args: &[Value]) -> Result<Value, Error> {
    let receiver = Value::Node(node.clone());
    match Operation::from_name(name).filter(|op| classify(node.kind(), *op).is_some()) {
        Some(op) => {
            let args: Vec<Value> = args.iter().map(Value::raw).collect();
            execute(node, op, &args, &receiver, &|value, _| value)
        }
        None => call_method(node, name, args, &receiver),
    }
}

/// Calls the function stored under `name` with `this` set to `receiver`.
pub(crate) fn call_method(
    node: &Node,
    name: &str,
    args: &[Value],
    receiver: &Value,
) -> Result<Value, Error> {
    let kind = node.kind();
    if kind != Kind::Object {
        return Err(unsupported_operation(kind, name));
    }
    match node.get_with(&Key::from(name), receiver)? {
        Value::Function(function) => function.call(receiver, args),
        _ => Err(Error::NotCallable(name.to_owned())),
    }
}

pub(crate) fn unsupported_operation(kind: Kind, name: &str) -> Error {
    Error::UnsupportedOperation {
        kind: kind.name(),
        name: name.to_owned(),
    }
}

/// Executes a classified operation against `node`.
///
/// `args` must already be unwrapped. Operations that return the
/// collection itself return `receiver`.
pub(crate) fn execute(
    node: &Node,
    op: Operation,
    args: &[Value],
    receiver: &Value,
    wrap: Wrap<'_>,
) -> Result<Value, Error> {
    let kind = node.kind();
    match (kind, op) {
        (_, Operation::HasOwnProperty) => {
            let key = property_key(&arg(args, 0));
            Ok(Value::Bool(node.own_descriptor(&key).is_some()))
        }
        (_, Operation::ToString) => Ok(Value::String(Value::Node(node.clone()).to_display_string())),
        (Kind::Array, _) => sequence(node, op, args, receiver),
        (Kind::Set | Kind::Map, Operation::Keys | Operation::Values | Operation::Entries) => {
            Ok(materialize(node, op, wrap))
        }
        (Kind::Set, _) => set(node, op, args, receiver, wrap),
        (Kind::Map, _) => map(node, op, args, receiver, wrap),
        (Kind::Date, _) => date(node, op, args),
        (Kind::Object, _) => Err(unsupported_operation(kind, op.name())),
    }
}

// ── Arguments ─────────────────────────────────────────────────────────────

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn function_arg(args: &[Value], index: usize) -> Result<crate::value::Function, Error> {
    match args.get(index) {
        Some(Value::Function(function)) => Ok(function.clone()),
        Some(other) => Err(Error::NotCallable(other.to_display_string())),
        None => Err(Error::NotCallable("undefined".to_owned())),
    }
}

fn property_key(value: &Value) -> Key {
    match value {
        Value::Symbol(symbol) => Key::Symbol(symbol.clone()),
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Key::Index(*n as usize),
        other => Key::Name(other.to_display_string()),
    }
}

pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        other => other
            .target_node()
            .and_then(|node| node.time())
            .unwrap_or(f64::NAN),
    }
}

fn to_integer(value: &Value) -> f64 {
    let n = to_number(value);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolves a relative index against `len`: negatives count from the end,
/// results clamp to `0..=len`, `undefined` means `default`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = to_integer(value);
    let len = len as f64;
    if n < 0.0 {
        (len + n).max(0.0) as usize
    } else {
        n.min(len) as usize
    }
}

// ── Sequences ─────────────────────────────────────────────────────────────

fn with_items<R>(node: &Node, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
    let mut composite = node.borrow_mut();
    match &mut *composite {
        Composite::Array(items) | Composite::Set(items) => f(items),
        _ => f(&mut Vec::new()),
    }
}

fn items_of(node: &Node) -> Vec<Value> {
    match &*node.borrow() {
        Composite::Array(items) | Composite::Set(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn sequence(node: &Node, op: Operation, args: &[Value], receiver: &Value) -> Result<Value, Error> {
    match op {
        Operation::Append => Ok(with_items(node, |items| {
            items.extend(args.iter().cloned());
            Value::from(items.len())
        })),
        Operation::RemoveLast => Ok(with_items(node, |items| items.pop().unwrap_or_default())),
        Operation::RemoveFirst => Ok(with_items(node, |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })),
        Operation::Prepend => Ok(with_items(node, |items| {
            items.splice(0..0, args.iter().cloned());
            Value::from(items.len())
        })),
        Operation::CopyWithin => {
            with_items(node, |items| {
                let len = items.len();
                let to = relative_index(&arg(args, 0), len, 0);
                let from = relative_index(&arg(args, 1), len, 0);
                let end = relative_index(&arg(args, 2), len, len);
                let count = end.saturating_sub(from).min(len - to);
                if count > 0 {
                    let chunk = items[from..from + count].to_vec();
                    items[to..to + count].clone_from_slice(&chunk);
                }
            });
            Ok(receiver.clone())
        }
        Operation::Reverse => {
            with_items(node, |items| items.reverse());
            Ok(receiver.clone())
        }
        Operation::Sort => {
            let comparator = match args.first() {
                None | Some(Value::Undefined) => None,
                Some(Value::Function(function)) => Some(function.clone()),
                Some(other) => {
                    return Err(Error::InvalidArgument(format!(
                        "sort comparator must be a function, got {}",
                        other.type_name()
                    )))
                }
            };
            // Sorted outside the borrow: comparators are user code.
            let (defined, undefined): (Vec<Value>, Vec<Value>) =
                items_of(node).into_iter().partition(|item| !item.is_undefined());
            let compare = |a: &Value, b: &Value| -> Result<Ordering, Error> {
                match &comparator {
                    Some(function) => {
                        let n = to_number(&function.call(&Value::Undefined, &[a.clone(), b.clone()])?);
                        Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
                    }
                    None => Ok(a.to_display_string().cmp(&b.to_display_string())),
                }
            };
            let mut sorted = merge_sort(defined, &compare)?;
            sorted.extend(undefined);
            with_items(node, |items| *items = sorted);
            Ok(receiver.clone())
        }
        Operation::Splice => Ok(with_items(node, |items| {
            let len = items.len();
            let start = relative_index(&arg(args, 0), len, 0);
            let delete_count = match args.len() {
                0 => 0,
                1 => len - start,
                _ => (to_integer(&args[1]).max(0.0) as usize).min(len - start),
            };
            let inserted = args.iter().skip(2).cloned();
            let removed: Vec<Value> = items.splice(start..start + delete_count, inserted).collect();
            Value::Node(Node::new(Composite::Array(removed)))
        })),
        Operation::Flatten => {
            let depth = match args.first() {
                None | Some(Value::Undefined) => 1.0,
                Some(value) => to_integer(value).max(0.0),
            };
            let mut flat = Vec::new();
            flatten_into(&mut flat, items_of(node), depth, &mut vec![node.id()]);
            with_items(node, |items| *items = flat);
            Ok(receiver.clone())
        }
        Operation::Fill => {
            let value = arg(args, 0);
            with_items(node, |items| {
                let len = items.len();
                let start = relative_index(&arg(args, 1), len, 0);
                let end = relative_index(&arg(args, 2), len, len);
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = value.clone();
                }
            });
            Ok(receiver.clone())
        }
        Operation::Concat => {
            let mut out = items_of(node);
            for extra in args {
                match extra.target_node() {
                    Some(other) if other.kind() == Kind::Array => out.extend(items_of(&other)),
                    _ => out.push(extra.raw()),
                }
            }
            Ok(Value::Node(Node::new(Composite::Array(out))))
        }
        Operation::Includes | Operation::IndexOf | Operation::LastIndexOf => {
            Ok(search(&items_of(node), op, &arg(args, 0), args.get(1)))
        }
        Operation::Join => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_owned(),
                Some(value) => value.to_display_string(),
            };
            let joined = items_of(node)
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(&separator);
            Ok(Value::String(joined))
        }
        Operation::Keys => {
            let indices = (0..node.len()).map(Value::from).collect();
            Ok(Value::Node(Node::new(Composite::Array(indices))))
        }
        other => Err(unsupported_operation(Kind::Array, other.name())),
    }
}

/// Equality-aware search. `includes` matches under SameValueZero, the
/// index searches under strict equality; both also match a wrapper
/// against its target since the needle is compared unwrapped.
fn search(items: &[Value], op: Operation, needle: &Value, from: Option<&Value>) -> Value {
    let not_found = if op == Operation::Includes {
        Value::Bool(false)
    } else {
        Value::Number(-1.0)
    };
    let found = |index: usize| {
        if op == Operation::Includes {
            Value::Bool(true)
        } else {
            Value::from(index)
        }
    };
    let matches = |item: &Value| {
        let item = item.raw();
        if op == Operation::Includes {
            same_value_zero(&item, needle)
        } else {
            strict_equals(&item, needle)
        }
    };

    let len = items.len() as i64;
    if len == 0 {
        return not_found;
    }
    let backward = op == Operation::LastIndexOf;
    let n = match from {
        None | Some(Value::Undefined) => {
            if backward {
                len - 1
            } else {
                0
            }
        }
        Some(value) => to_integer(value) as i64,
    };

    if backward {
        let mut index = if n < 0 { len + n } else { n.min(len - 1) };
        while index >= 0 {
            if matches(&items[index as usize]) {
                return found(index as usize);
            }
            index -= 1;
        }
    } else {
        let start = if n < 0 { (len + n).max(0) } else { n };
        for index in start..len {
            if matches(&items[index as usize]) {
                return found(index as usize);
            }
        }
    }
    not_found
}

fn merge_sort(
    mut items: Vec<Value>,
    compare: &dyn Fn(&Value, &Value) -> Result<Ordering, Error>,
) -> Result<Vec<Value>, Error> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        // Ties keep the left element first.
        let take_right = compare(b, a)? == Ordering::Less;
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

fn flatten_into(out: &mut Vec<Value>, items: Vec<Value>, depth: f64, visiting: &mut Vec<NodeId>) {
    for item in items {
        if depth >= 1.0 {
            if let Value::Node(inner) = &item {
                if inner.kind() == Kind::Array && !visiting.contains(&inner.id()) {
                    visiting.push(inner.id());
                    flatten_into(out, items_of(inner), depth - 1.0, visiting);
                    visiting.pop();
                    continue;
                }
            }
        }
        out.push(item);
    }
}

// ── Sets and maps ─────────────────────────────────────────────────────────

/// Appends `member` unless an equal one is present. Returns whether it
/// was added.
pub(crate) fn set_insert(items: &mut Vec<Value>, member: Value) -> bool {
    if items.iter().any(|item| same_value_zero(item, &member)) {
        return false;
    }
    items.push(member);
    true
}

fn set(
    node: &Node,
    op: Operation,
    args: &[Value],
    receiver: &Value,
    wrap: Wrap<'_>,
) -> Result<Value, Error> {
    let member = arg(args, 0);
    match op {
        Operation::Add => {
            with_items(node, |items| set_insert(items, member));
            Ok(receiver.clone())
        }
        Operation::Clear => {
            with_items(node, Vec::clear);
            Ok(Value::Undefined)
        }
        Operation::Delete => Ok(Value::Bool(with_items(node, |items| {
            match items.iter().position(|item| same_value_zero(item, &member)) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            }
        }))),
        Operation::Has => Ok(Value::Bool(
            items_of(node).iter().any(|item| same_value_zero(item, &member)),
        )),
        Operation::Size => Ok(Value::from(node.len())),
        Operation::ForEach => {
            let callback = function_arg(args, 0)?;
            let this = arg(args, 1);
            for (index, member) in items_of(node).into_iter().enumerate() {
                let member = wrap(member, &Key::Index(index));
                callback.call(&this, &[member.clone(), member, receiver.clone()])?;
            }
            Ok(Value::Undefined)
        }
        other => Err(unsupported_operation(Kind::Set, other.name())),
    }
}

fn with_entries<R>(node: &Node, f: impl FnOnce(&mut indexmap::IndexMap<Key, Value>) -> R) -> R {
    let mut composite = node.borrow_mut();
    match &mut *composite {
        Composite::Map(entries) => f(entries),
        _ => f(&mut indexmap::IndexMap::new()),
    }
}

fn entries_of(node: &Node) -> Vec<(Key, Value)> {
    match &*node.borrow() {
        Composite::Map(entries) => entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

fn map(
    node: &Node,
    op: Operation,
    args: &[Value],
    receiver: &Value,
    wrap: Wrap<'_>,
) -> Result<Value, Error> {
    // Lookups with a value that cannot be a key simply miss.
    let lookup = arg(args, 0).to_key().ok();
    match op {
        Operation::Set => {
            let key = arg(args, 0).to_key()?;
            let value = arg(args, 1);
            with_entries(node, |entries| entries.insert(key, value));
            Ok(receiver.clone())
        }
        Operation::Get => Ok(lookup
            .and_then(|key| with_entries(node, |entries| entries.get(&key).cloned()))
            .unwrap_or_default()),
        Operation::Has => Ok(Value::Bool(lookup.is_some_and(|key| {
            with_entries(node, |entries| entries.contains_key(&key))
        }))),
        Operation::Delete => Ok(Value::Bool(lookup.is_some_and(|key| {
            with_entries(node, |entries| entries.shift_remove(&key).is_some())
        }))),
        Operation::Clear => {
            with_entries(node, |entries| entries.clear());
            Ok(Value::Undefined)
        }
        Operation::Size => Ok(Value::from(node.len())),
        Operation::ForEach => {
            let callback = function_arg(args, 0)?;
            let this = arg(args, 1);
            for (key, value) in entries_of(node) {
                let value = wrap(value, &key);
                callback.call(&this, &[value, Value::from(key), receiver.clone()])?;
            }
            Ok(Value::Undefined)
        }
        other => Err(unsupported_operation(Kind::Map, other.name())),
    }
}

/// Collects the output of `keys`, `values` or `entries` into a fresh
/// sequence. Map keys are returned as plain values; members go through
/// `wrap` with the key they live at.
pub(crate) fn materialize(node: &Node, op: Operation, wrap: Wrap<'_>) -> Value {
    let kind = node.kind();
    let out = members(node)
        .into_iter()
        .map(|(key, value)| {
            let key_value = |value: &Value| match kind {
                Kind::Set => wrap(value.clone(), &key),
                _ => Value::from(key.clone()),
            };
            match op {
                Operation::Keys => key_value(&value),
                Operation::Entries => {
                    let first = key_value(&value);
                    let second = wrap(value, &key);
                    Value::Node(Node::new(Composite::Array(vec![first, second])))
                }
                _ => wrap(value, &key),
            }
        })
        .collect();
    Value::Node(Node::new(Composite::Array(out)))
}

/// Snapshot of a set's or map's members with the key each lives at.
/// Set members are keyed by position.
pub(crate) fn members(node: &Node) -> Vec<(Key, Value)> {
    match node.kind() {
        Kind::Map => entries_of(node),
        _ => items_of(node)
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Key::Index(index), item))
            .collect(),
    }
}

// ── Dates ─────────────────────────────────────────────────────────────────

fn date(node: &Node, op: Operation, args: &[Value]) -> Result<Value, Error> {
    let t = node.time().unwrap_or(f64::NAN);
    let number = |index: usize, fallback: f64| match args.get(index) {
        Some(value) => to_number(value),
        None => fallback,
    };
    let updated = match op {
        Operation::GetTime | Operation::ValueOf => return Ok(Value::Number(t)),
        Operation::SetTime => time_clip(number(0, f64::NAN)),
        // An invalid date counts as the epoch here.
        Operation::SetUtcFullYear => {
            let t = if t.is_nan() { 0.0 } else { t };
            let (_, month, day) = calendar_of(t);
            make_date(
                make_day(number(0, f64::NAN), number(1, month), number(2, day)),
                t,
            )
        }
        _ if t.is_nan() => f64::NAN,
        Operation::SetUtcMonth => {
            let (year, _, day) = calendar_of(t);
            make_date(make_day(year, number(0, f64::NAN), number(1, day)), t)
        }
        Operation::SetUtcDate => {
            let (year, month, _) = calendar_of(t);
            make_date(make_day(year, month, number(0, f64::NAN)), t)
        }
        Operation::SetUtcHours => compose(
            t,
            number(0, f64::NAN),
            number(1, minutes_of(t)),
            number(2, seconds_of(t)),
            number(3, millis_of(t)),
        ),
        Operation::SetUtcMinutes => compose(
            t,
            hours_of(t),
            number(0, f64::NAN),
            number(1, seconds_of(t)),
            number(2, millis_of(t)),
        ),
        Operation::SetUtcSeconds => compose(
            t,
            hours_of(t),
            minutes_of(t),
            number(0, f64::NAN),
            number(1, millis_of(t)),
        ),
        Operation::SetUtcMilliseconds => compose(
            t,
            hours_of(t),
            minutes_of(t),
            seconds_of(t),
            number(0, f64::NAN),
        ),
        other => return Err(unsupported_operation(Kind::Date, other.name())),
    };
    if let Composite::Date(ms) = &mut *node.borrow_mut() {
        *ms = updated;
    }
    Ok(Value::Number(updated))
}

fn compose(t: f64, hours: f64, minutes: f64, seconds: f64, millis: f64) -> f64 {
    let parts = [hours, minutes, seconds, millis];
    if parts.iter().any(|part| !part.is_finite()) {
        return f64::NAN;
    }
    let [h, m, s, ms] = parts.map(f64::trunc);
    let day = (t / MS_PER_DAY).floor();
    time_clip(day * MS_PER_DAY + h * MS_PER_HOUR + m * MS_PER_MINUTE + s * MS_PER_SECOND + ms)
}

/// Year, zero-based month and day of month of a valid timestamp.
fn calendar_of(t: f64) -> (f64, f64, f64) {
    let (year, month, day) = civil_from_days((t / MS_PER_DAY).floor() as i64);
    (year as f64, f64::from(month - 1), f64::from(day))
}

/// Days since the epoch for `date` in zero-based `month` of `year`.
/// Months outside `0..12` roll over into neighbouring years.
fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if !(year.is_finite() && month.is_finite() && date.is_finite()) {
        return f64::NAN;
    }
    let (month, date) = (month.trunc(), date.trunc());
    let year = year.trunc() + (month / 12.0).floor();
    // Far outside the representable range; also keeps the casts exact.
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    let month = month.rem_euclid(12.0) as u32 + 1;
    days_from_civil(year as i64, month, 1) as f64 + date - 1.0
}

/// Combines a day number with the time of day of `t`.
fn make_date(day: f64, t: f64) -> f64 {
    time_clip(day * MS_PER_DAY + t.rem_euclid(MS_PER_DAY))
}

fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > 8.64e15 {
        f64::NAN
    } else {
        t.trunc() + 0.0
    }
}

fn hours_of(t: f64) -> f64 {
    (t.rem_euclid(MS_PER_DAY) / MS_PER_HOUR).floor()
}

fn minutes_of(t: f64) -> f64 {
    (t / MS_PER_MINUTE).floor().rem_euclid(60.0)
}

fn seconds_of(t: f64) -> f64 {
    (t / MS_PER_SECOND).floor().rem_euclid(60.0)
}

fn millis_of(t: f64) -> f64 {
    t.rem_euclid(MS_PER_SECOND)
}

/// ISO-8601 in UTC, or `Invalid Date`.
pub(crate) fn date_string(t: f64) -> String {
    if !t.is_finite() {
        return "Invalid Date".to_owned();
    }
    let days = (t / MS_PER_DAY).floor() as i64;
    let (year, month, day) = civil_from_days(days);
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else {
        format!("{year:+07}")
    };
    format!(
        "{year}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        hours_of(t) as u32,
        minutes_of(t) as u32,
        seconds_of(t) as u32,
        millis_of(t) as u32,
    )
}

// Proleptic Gregorian calendar from days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

// Inverse of `civil_from_days`.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let yoe = year - era * 400;
    let mp = i64::from((month + 9) % 12);
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Function;
    use serde_json::json;

    fn run(value: &Value, name: &str, args: &[Value]) -> Value {
        value.invoke(name, args).unwrap()
    }

    #[test]
    fn test_sequence_mutators() {
        let list = Value::from(json!([3, 1, 2]));
        assert_eq!(run(&list, "append", &[Value::from(4)]).as_f64(), Some(4.0));
        assert_eq!(run(&list, "remove_first", &[]).as_f64(), Some(3.0));
        assert_eq!(run(&list, "remove_last", &[]).as_f64(), Some(4.0));
        assert_eq!(run(&list, "prepend", &[Value::from(0)]).as_f64(), Some(3.0));
        assert_eq!(list.to_json(), json!([0, 1, 2]));
        run(&list, "reverse", &[]);
        assert_eq!(list.to_json(), json!([2, 1, 0]));
        run(&list, "fill", &[Value::from(9), Value::from(-1)]);
        assert_eq!(list.to_json(), json!([2, 1, 9]));
        run(&list, "copy_within", &[Value::from(0), Value::from(1)]);
        assert_eq!(list.to_json(), json!([1, 9, 9]));
    }

    #[test]
    fn test_splice() {
        let list = Value::from(json!([1, 2, 3, 4]));
        let removed = run(&list, "splice", &[Value::from(1), Value::from(2), Value::from("x")]);
        assert_eq!(removed.to_json(), json!([2, 3]));
        assert_eq!(list.to_json(), json!([1, "x", 4]));
        let removed = run(&list, "splice", &[Value::from(-1)]);
        assert_eq!(removed.to_json(), json!([4]));
        assert_eq!(list.to_json(), json!([1, "x"]));
    }

    #[test]
    fn test_sort_default_and_comparator() {
        let list = Value::from(json!([10, 9, 1, null]));
        list.set(4usize, Value::Undefined).unwrap();
        run(&list, "sort", &[]);
        assert_eq!(list.to_json(), json!([1, 10, 9, null, null]));
        assert!(list.get(4).unwrap().is_undefined());

        let numbers = Value::from(json!([10, 9, 1]));
        let ascending = Function::new("ascending", |_, args| {
            Ok(Value::from(
                args[0].as_f64().unwrap_or(0.0) - args[1].as_f64().unwrap_or(0.0),
            ))
        });
        run(&numbers, "sort", &[Value::from(ascending)]);
        assert_eq!(numbers.to_json(), json!([1, 9, 10]));
    }

    #[test]
    fn test_sort_comparator_error_leaves_sequence() {
        let list = Value::from(json!([2, 1]));
        let failing = Function::new("failing", |_, _| Err(Error::callback("boom")));
        assert_eq!(
            list.invoke("sort", &[Value::from(failing)]).unwrap_err(),
            Error::Callback("boom".to_owned())
        );
        assert_eq!(list.to_json(), json!([2, 1]));
    }

    #[test]
    fn test_flatten_in_place() {
        let list = Value::from(json!([1, [2, [3, [4]]]]));
        run(&list, "flatten", &[]);
        assert_eq!(list.to_json(), json!([1, 2, [3, [4]]]));
        run(&list, "flatten", &[Value::Number(f64::INFINITY)]);
        assert_eq!(list.to_json(), json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_search() {
        let list = Value::from(json!([1, 2, 1]));
        list.set(3usize, f64::NAN).unwrap();
        assert_eq!(run(&list, "index_of", &[Value::from(1)]).as_f64(), Some(0.0));
        assert_eq!(run(&list, "last_index_of", &[Value::from(1)]).as_f64(), Some(2.0));
        assert_eq!(
            run(&list, "index_of", &[Value::from(1), Value::from(1)]).as_f64(),
            Some(2.0)
        );
        assert_eq!(
            run(&list, "last_index_of", &[Value::from(1), Value::from(-3)]).as_f64(),
            Some(0.0)
        );
        assert_eq!(
            run(&list, "index_of", &[Value::Number(f64::NAN)]).as_f64(),
            Some(-1.0)
        );
        assert_eq!(
            run(&list, "includes", &[Value::Number(f64::NAN)]).as_bool(),
            Some(true)
        );
        assert_eq!(
            run(&list, "includes", &[Value::from(2), Value::from(-2)]).as_bool(),
            Some(false)
        );
    }

    #[test]
    fn test_join_and_concat() {
        let list = Value::from(json!([1, null, "a"]));
        assert_eq!(run(&list, "join", &[]).as_str(), Some("1,,a"));
        assert_eq!(run(&list, "join", &[Value::from("-")]).as_str(), Some("1--a"));
        let joined = run(&list, "concat", &[Value::from(json!([2, 3])), Value::from(4)]);
        assert_eq!(joined.to_json(), json!([1, null, "a", 2, 3, 4]));
        assert_eq!(list.to_json(), json!([1, null, "a"]));
    }

    #[test]
    fn test_set_operations() {
        let set = Value::Node(Node::set([Value::from(1), Value::from(2), Value::from(1)]));
        assert_eq!(set.to_json(), json!([1, 2]));
        run(&set, "add", &[Value::from(3)]);
        run(&set, "add", &[Value::from(3)]);
        assert_eq!(run(&set, "size", &[]).as_f64(), Some(3.0));
        assert_eq!(run(&set, "delete", &[Value::from(1)]).as_bool(), Some(true));
        assert_eq!(run(&set, "has", &[Value::from(1)]).as_bool(), Some(false));
        assert_eq!(run(&set, "entries", &[]).to_json(), json!([[2, 2], [3, 3]]));
        run(&set, "clear", &[]);
        assert_eq!(set.to_json(), json!([]));
    }

    #[test]
    fn test_map_operations() {
        let map = Value::Node(Node::map([("a", 1)]));
        run(&map, "set", &[Value::from("b"), Value::from(2)]);
        assert_eq!(run(&map, "get", &[Value::from("b")]).as_f64(), Some(2.0));
        assert!(run(&map, "get", &[Value::from(json!({}))]).is_undefined());
        assert_eq!(run(&map, "keys", &[]).to_json(), json!(["a", "b"]));
        assert_eq!(run(&map, "entries", &[]).to_json(), json!([["a", 1], ["b", 2]]));
        assert_eq!(run(&map, "delete", &[Value::from("a")]).as_bool(), Some(true));
        assert_eq!(map.to_json(), json!({"b": 2}));
    }

    #[test]
    fn test_date_setters() {
        let date = Value::Node(Node::date(0.0));
        assert_eq!(run(&date, "set_utc_hours", &[Value::from(5)]).as_f64(), Some(18_000_000.0));
        assert_eq!(
            run(&date, "set_utc_minutes", &[Value::from(1), Value::from(2)]).as_f64(),
            Some(18_062_000.0)
        );
        assert_eq!(
            run(&date, "set_utc_milliseconds", &[Value::from(7)]).as_f64(),
            Some(18_062_007.0)
        );
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("1970-01-01T05:01:02.007Z"));
        run(&date, "set_time", &[Value::from(f64::NAN)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("Invalid Date"));
        assert!(run(&date, "set_utc_hours", &[Value::from(1)]).as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_calendar_date_setters() {
        let date = Value::Node(Node::date(3_600_000.0));
        assert_eq!(
            run(&date, "set_utc_full_year", &[Value::from(2024)]).as_f64(),
            Some(1_704_070_800_000.0)
        );
        run(&date, "set_utc_date", &[Value::from(31)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("2024-01-31T01:00:00.000Z"));
        run(&date, "set_utc_month", &[Value::from(1)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("2024-03-02T01:00:00.000Z"));
        run(&date, "set_utc_month", &[Value::from(12), Value::from(5)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("2025-01-05T01:00:00.000Z"));
        run(&date, "set_utc_date", &[Value::from(0)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("2024-12-31T01:00:00.000Z"));
        run(&date, "set_utc_full_year", &[Value::from(2023), Value::from(1), Value::from(29)]);
        assert_eq!(run(&date, "to_string", &[]).as_str(), Some("2023-03-01T01:00:00.000Z"));

        run(&date, "set_time", &[Value::from(f64::NAN)]);
        assert!(run(&date, "set_utc_date", &[Value::from(1)]).as_f64().unwrap().is_nan());
        assert!(run(&date, "set_utc_month", &[Value::from(1)]).as_f64().unwrap().is_nan());
        assert_eq!(
            run(&date, "set_utc_full_year", &[Value::from(2000)]).as_f64(),
            Some(946_684_800_000.0)
        );
        assert!(run(&date, "set_utc_full_year", &[Value::from(f64::INFINITY)])
            .as_f64()
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2024, 1, 1), 19_723);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
    }

    #[test]
    fn test_custom_methods_and_unknown_operations() {
        let object = Value::from(json!({"n": 1}));
        object
            .set(
                "bump",
                Function::new("bump", |this, _| {
                    let n = this.get("n")?.as_f64().unwrap_or(0.0);
                    this.set("n", n + 1.0)?;
                    Ok(Value::Undefined)
                }),
            )
            .unwrap();
        object.invoke("bump", &[]).unwrap();
        assert_eq!(object.get("n").unwrap().as_f64(), Some(2.0));
        assert_eq!(
            object.invoke("n", &[]).unwrap_err(),
            Error::NotCallable("n".to_owned())
        );
        assert!(matches!(
            Value::from(json!([])).invoke("add", &[]),
            Err(Error::UnsupportedOperation { .. })
        ));
    }
}
