//! Dynamic values the observer operates on.
//!
//! Scalars are plain variants of [`Value`]. Composite data lives in a
//! [`Node`]: a shared, identity-bearing cell holding one [`Composite`]. Two
//! values are "the same object" exactly when they hold the same node.
//!
//! Every accessor on [`Value`] is transparent: on a raw node it acts
//! directly, on an [`Observed`] wrapper it goes through the observer.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use on_change_path::{Key, Path, Symbol};

use crate::builtins;
use crate::equal::same_value;
use crate::error::Error;
use crate::observe::Observed;

// ── Functions ─────────────────────────────────────────────────────────────

/// Signature of native function bodies: `(this, args) -> result`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, Error>;

/// A named native closure stored as a value.
///
/// Used for custom methods, accessor properties, sort comparators and
/// `for_each` callbacks. Equality is identity of the closure.
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    body: Rc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<Rc<str>>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Error> + 'static,
    {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Error> {
        (self.body)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.body), Rc::as_ptr(&other.body))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

fn same_function(a: &Option<Function>, b: &Option<Function>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

// ── Descriptors ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor { get: Option<Function>, set: Option<Function> },
}

/// A property descriptor: a data or accessor slot plus its flags.
#[derive(Clone, Debug)]
pub struct Descriptor {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Descriptor {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            slot: Slot::Data {
                value: value.into(),
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    pub fn accessor(get: Option<Function>, set: Option<Function>) -> Self {
        Self {
            slot: Slot::Accessor { get, set },
            enumerable: true,
            configurable: true,
        }
    }

    /// Has no effect on accessor descriptors.
    pub fn writable(mut self, writable: bool) -> Self {
        if let Slot::Data { writable: slot, .. } = &mut self.slot {
            *slot = writable;
        }
        self
    }

    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.slot, Slot::Data { writable: true, .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self.slot, Slot::Accessor { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data { value, .. } => Some(value),
            Slot::Accessor { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<&Function> {
        match &self.slot {
            Slot::Accessor { get, .. } => get.as_ref(),
            Slot::Data { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<&Function> {
        match &self.slot {
            Slot::Accessor { set, .. } => set.as_ref(),
            Slot::Data { .. } => None,
        }
    }

    /// Field-by-field equality; values by SameValue, functions by identity.
    pub fn same_as(&self, other: &Descriptor) -> bool {
        self.enumerable == other.enumerable
            && self.configurable == other.configurable
            && match (&self.slot, &other.slot) {
                (
                    Slot::Data { value: a, writable: wa },
                    Slot::Data { value: b, writable: wb },
                ) => wa == wb && same_value(a, b),
                (
                    Slot::Accessor { get: ga, set: sa },
                    Slot::Accessor { get: gb, set: sb },
                ) => same_function(ga, gb) && same_function(sa, sb),
                _ => false,
            }
    }

    pub(crate) fn with_raw_value(mut self) -> Self {
        if let Slot::Data { value, .. } = &mut self.slot {
            *value = value.raw();
        }
        self
    }
}

// ── Composites ────────────────────────────────────────────────────────────

/// The supported composite kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Object,
    Array,
    Set,
    Map,
    Date,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Set => "set",
            Kind::Map => "map",
            Kind::Date => "date",
        }
    }
}

/// An ordered property table with an optional prototype.
#[derive(Clone, Debug, Default)]
pub struct Object {
    pub properties: IndexMap<Key, Descriptor>,
    pub prototype: Option<Node>,
}

#[derive(Clone, Debug)]
pub enum Composite {
    Object(Object),
    Array(Vec<Value>),
    /// Insertion-ordered, unique under SameValueZero.
    Set(Vec<Value>),
    Map(IndexMap<Key, Value>),
    /// Milliseconds since the Unix epoch; NaN is an invalid date.
    Date(f64),
}

impl Composite {
    pub fn kind(&self) -> Kind {
        match self {
            Composite::Object(_) => Kind::Object,
            Composite::Array(_) => Kind::Array,
            Composite::Set(_) => Kind::Set,
            Composite::Map(_) => Kind::Map,
            Composite::Date(_) => Kind::Date,
        }
    }
}

/// Stable identity of a live node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Debug, Default)]
pub struct WeakNode(Weak<RefCell<Composite>>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Shared handle to a composite value.
#[derive(Clone)]
pub struct Node(Rc<RefCell<Composite>>);

impl Node {
    pub fn new(composite: Composite) -> Self {
        Node(Rc::new(RefCell::new(composite)))
    }

    pub fn object() -> Self {
        Node::new(Composite::Object(Object::default()))
    }

    pub fn object_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let properties = entries
            .into_iter()
            .map(|(key, value)| (key.into().to_name_key(), Descriptor::data(value.into().raw())))
            .collect();
        Node::new(Composite::Object(Object {
            properties,
            prototype: None,
        }))
    }

    /// An empty object inheriting from `prototype`.
    pub fn with_prototype(prototype: Node) -> Self {
        Node::new(Composite::Object(Object {
            properties: IndexMap::new(),
            prototype: Some(prototype),
        }))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Node::new(Composite::Array(items.iter().map(Value::raw).collect()))
    }

    /// Builds a set, dropping repeated members.
    pub fn set<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut items: Vec<Value> = Vec::new();
        for member in members {
            builtins::set_insert(&mut items, member.raw());
        }
        Node::new(Composite::Set(items))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into().raw()))
            .collect();
        Node::new(Composite::Map(entries))
    }

    pub fn date(ms: f64) -> Self {
        Node::new(Composite::Date(ms))
    }

    pub fn id(&self) -> NodeId {
        NodeId(Rc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, Composite> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Composite> {
        self.0.borrow_mut()
    }

    pub fn kind(&self) -> Kind {
        self.borrow().kind()
    }

    /// Number of elements, members, entries or own properties.
    pub fn len(&self) -> usize {
        match &*self.borrow() {
            Composite::Object(object) => object.properties.len(),
            Composite::Array(items) | Composite::Set(items) => items.len(),
            Composite::Map(entries) => entries.len(),
            Composite::Date(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn time(&self) -> Option<f64> {
        match &*self.borrow() {
            Composite::Date(ms) => Some(*ms),
            _ => None,
        }
    }

    /// A new node holding a copy of this node's top level.
    pub fn shallow_clone(&self) -> Node {
        Node::new(self.borrow().clone())
    }

    /// Spells `key` the way this kind addresses its slots: names for
    /// objects, indices for sequence elements and set members.
    pub fn normalize_key(&self, key: &Key) -> Key {
        match self.kind() {
            Kind::Object => key.to_name_key(),
            Kind::Array if key.as_name() == Some("length") => key.clone(),
            Kind::Array | Kind::Set => key.to_index_key(),
            Kind::Map | Kind::Date => key.clone(),
        }
    }

    pub fn own_descriptor(&self, key: &Key) -> Option<Descriptor> {
        let key = self.normalize_key(key);
        match &*self.borrow() {
            Composite::Object(object) => object.properties.get(&key).cloned(),
            Composite::Array(items) => match &key {
                Key::Index(index) => items.get(*index).cloned().map(Descriptor::data),
                Key::Name(name) if name == "length" => Some(
                    Descriptor::data(items.len() as f64)
                        .enumerable(false)
                        .configurable(false),
                ),
                _ => None,
            },
            Composite::Set(items) => key
                .to_index()
                .and_then(|index| items.get(index))
                .cloned()
                .map(Descriptor::data),
            Composite::Map(entries) => map_entry_index(entries, &key)
                .and_then(|index| entries.get_index(index))
                .map(|(_, value)| Descriptor::data(value.clone())),
            Composite::Date(_) => None,
        }
    }

    /// Finds `key` on this node or along its prototype chain.
    fn lookup(&self, key: &Key) -> Option<Descriptor> {
        let mut visited = HashSet::new();
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if !visited.insert(node.id()) {
                break;
            }
            if let Some(descriptor) = node.own_descriptor(key) {
                return Some(descriptor);
            }
            current = node.prototype();
        }
        None
    }

    fn prototype(&self) -> Option<Node> {
        match &*self.borrow() {
            Composite::Object(object) => object.prototype.clone(),
            _ => None,
        }
    }

    pub fn has_setter_in_chain(&self, key: &Key) -> bool {
        self.lookup(key)
            .is_some_and(|descriptor| descriptor.setter().is_some())
    }

    pub fn has(&self, key: &Key) -> bool {
        self.lookup(key).is_some()
    }

    /// Reads `key`, running getters with `receiver` as `this`.
    pub fn get_with(&self, key: &Key, receiver: &Value) -> Result<Value, Error> {
        match self.lookup(key) {
            Some(Descriptor {
                slot: Slot::Data { value, .. },
                ..
            }) => Ok(value),
            Some(Descriptor {
                slot: Slot::Accessor { get: Some(getter), .. },
                ..
            }) => getter.call(receiver, &[]),
            Some(_) | None => Ok(Value::Undefined),
        }
    }

    /// Writes `key`, running setters with `receiver` as `this`.
    ///
    /// Returns `Ok(false)` when the property refuses the write.
    pub fn set_with(&self, key: &Key, value: Value, receiver: &Value) -> Result<bool, Error> {
        let key = self.normalize_key(key);
        let value = value.raw();
        match self.kind() {
            Kind::Object => {
                match self.lookup(&key).map(|descriptor| descriptor.slot) {
                    Some(Slot::Accessor { set: Some(setter), .. }) => {
                        setter.call(receiver, &[value])?;
                        return Ok(true);
                    }
                    Some(Slot::Accessor { set: None, .. })
                    | Some(Slot::Data {
                        writable: false, ..
                    }) => return Ok(false),
                    Some(Slot::Data { .. }) | None => {}
                }
                let mut composite = self.borrow_mut();
                let Composite::Object(object) = &mut *composite else {
                    return Ok(false);
                };
                match object.properties.get_mut(&key) {
                    Some(Descriptor {
                        slot: Slot::Data { value: slot, .. },
                        ..
                    }) => *slot = value,
                    Some(_) => return Ok(false),
                    None => {
                        object.properties.insert(key, Descriptor::data(value));
                    }
                }
                Ok(true)
            }
            Kind::Array => {
                let mut composite = self.borrow_mut();
                let Composite::Array(items) = &mut *composite else {
                    return Ok(false);
                };
                match &key {
                    Key::Index(index) if *index < MAX_SEQUENCE_LEN => {
                        if *index >= items.len() {
                            grow(items, index + 1)?;
                        }
                        items[*index] = value;
                        Ok(true)
                    }
                    Key::Name(name) if name == "length" => {
                        let len = array_length(&value)?;
                        if len > items.len() {
                            grow(items, len)?;
                        } else {
                            items.truncate(len);
                        }
                        Ok(true)
                    }
                    other => Err(unsupported_key(Kind::Array, other)),
                }
            }
            kind => Err(unsupported_key(kind, &key)),
        }
    }

    /// Removes an own property. Absent properties delete successfully.
    pub fn delete(&self, key: &Key) -> Result<bool, Error> {
        let key = self.normalize_key(key);
        let mut composite = self.borrow_mut();
        match &mut *composite {
            Composite::Object(object) => match object.properties.get(&key) {
                None => Ok(true),
                Some(descriptor) if !descriptor.configurable => Ok(false),
                Some(_) => {
                    object.properties.shift_remove(&key);
                    Ok(true)
                }
            },
            Composite::Array(items) => match &key {
                Key::Index(index) => {
                    if let Some(slot) = items.get_mut(*index) {
                        *slot = Value::Undefined;
                    }
                    Ok(true)
                }
                Key::Name(name) if name == "length" => Ok(false),
                _ => Ok(true),
            },
            other => Err(unsupported_key(other.kind(), &key)),
        }
    }

    /// Installs `descriptor` as an own property.
    ///
    /// Non-configurable properties only accept compatible redefinitions.
    pub fn define_property(&self, key: &Key, descriptor: Descriptor) -> Result<bool, Error> {
        let key = self.normalize_key(key);
        let descriptor = descriptor.with_raw_value();
        match self.kind() {
            Kind::Object => {
                let mut composite = self.borrow_mut();
                let Composite::Object(object) = &mut *composite else {
                    return Ok(false);
                };
                if let Some(existing) = object.properties.get(&key) {
                    if !existing.configurable && !is_compatible_redefinition(existing, &descriptor) {
                        return Ok(false);
                    }
                }
                object.properties.insert(key, descriptor);
                Ok(true)
            }
            Kind::Array => match descriptor.slot {
                Slot::Data { value, .. } => self.set_with(&key, value, &Value::Node(self.clone())),
                Slot::Accessor { .. } => Err(unsupported_key(Kind::Array, &key)),
            },
            kind => Err(unsupported_key(kind, &key)),
        }
    }

    // Plain slot access without getters, setters or flag checks. Used on
    // change-tracking clones.

    pub(crate) fn get_plain(&self, key: &Key) -> Value {
        self.own_descriptor(key)
            .and_then(|descriptor| descriptor.value().cloned())
            .unwrap_or_default()
    }

    pub(crate) fn put_plain(&self, key: &Key, value: Value) {
        let key = self.normalize_key(key);
        let mut composite = self.borrow_mut();
        match &mut *composite {
            Composite::Object(object) => match object.properties.get_mut(&key) {
                Some(Descriptor {
                    slot: Slot::Data { value: slot, .. },
                    ..
                }) => *slot = value,
                _ => {
                    object.properties.insert(key, Descriptor::data(value));
                }
            },
            Composite::Array(items) => {
                if let Key::Index(index) = key {
                    if index < items.len() {
                        items[index] = value;
                    } else if index < MAX_SEQUENCE_LEN && grow(items, index + 1).is_ok() {
                        items[index] = value;
                    }
                }
            }
            Composite::Set(items) => {
                if let Some(slot) = key.to_index().and_then(|index| items.get_mut(index)) {
                    *slot = value;
                }
            }
            Composite::Map(entries) => match map_entry_index(entries, &key) {
                Some(index) => {
                    if let Some((_, slot)) = entries.get_index_mut(index) {
                        *slot = value;
                    }
                }
                None => {
                    entries.insert(key, value);
                }
            },
            Composite::Date(_) => {}
        }
    }

    pub(crate) fn remove_plain(&self, key: &Key) {
        let key = self.normalize_key(key);
        let mut composite = self.borrow_mut();
        match &mut *composite {
            Composite::Object(object) => {
                object.properties.shift_remove(&key);
            }
            Composite::Array(items) => {
                if let Some(slot) = key.to_index().and_then(|index| items.get_mut(index)) {
                    *slot = Value::Undefined;
                }
            }
            Composite::Map(entries) => {
                if let Some(index) = map_entry_index(entries, &key) {
                    entries.shift_remove_index(index);
                }
            }
            Composite::Set(_) | Composite::Date(_) => {}
        }
    }

    /// Follows `path` through plain slots.
    pub(crate) fn resolve_plain(&self, path: &Path) -> Option<Node> {
        let mut current = self.clone();
        for key in path.walk() {
            let next = current.get_plain(&key);
            current = next.as_node()?.clone();
        }
        Some(current)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Node");
        match self.0.try_borrow() {
            Ok(composite) => tuple.field(&composite.kind()),
            Err(_) => tuple.field(&"<borrowed>"),
        };
        tuple.field(&self.id().0).finish()
    }
}

fn map_entry_index(entries: &IndexMap<Key, Value>, key: &Key) -> Option<usize> {
    entries
        .get_index_of(key)
        .or_else(|| entries.get_index_of(&key.to_index_key()))
        .or_else(|| entries.get_index_of(&key.to_name_key()))
}

fn is_compatible_redefinition(existing: &Descriptor, next: &Descriptor) -> bool {
    if next.configurable || next.enumerable != existing.enumerable {
        return false;
    }
    match (&existing.slot, &next.slot) {
        (Slot::Data { writable: true, .. }, Slot::Data { .. }) => true,
        (
            Slot::Data {
                value: a,
                writable: false,
            },
            Slot::Data {
                value: b,
                writable: false,
            },
        ) => same_value(a, b),
        (Slot::Accessor { get: ga, set: sa }, Slot::Accessor { get: gb, set: sb }) => {
            same_function(ga, gb) && same_function(sa, sb)
        }
        _ => false,
    }
}

/// Sequences hold at most `2^32 - 1` elements, so the largest index is
/// `2^32 - 2`.
pub(crate) const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

/// Pads `items` with `undefined` up to `len`, failing instead of aborting
/// when the memory is not there.
fn grow(items: &mut Vec<Value>, len: usize) -> Result<(), Error> {
    if len > MAX_SEQUENCE_LEN {
        return Err(Error::InvalidArgument(format!("invalid array length {len}")));
    }
    let extra = len.saturating_sub(items.len());
    items.try_reserve(extra).map_err(|err| {
        Error::InvalidArgument(format!("cannot grow array to {len} elements: {err}"))
    })?;
    items.resize(len, Value::Undefined);
    Ok(())
}

fn array_length(value: &Value) -> Result<usize, Error> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_SEQUENCE_LEN as f64 => {
            Ok(*n as usize)
        }
        other => Err(Error::InvalidArgument(format!(
            "invalid array length {}",
            other.to_display_string()
        ))),
    }
}

pub(crate) fn unsupported_key(kind: Kind, key: &Key) -> Error {
    Error::UnsupportedKey {
        kind: kind.name(),
        key: key.to_string(),
    }
}

// ── Values ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(Symbol),
    Function(Function),
    Node(Node),
    Observed(Observed),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Node(_) | Value::Observed(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The raw node, if this is one. Wrappers return `None`.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_observed(&self) -> Option<&Observed> {
        match self {
            Value::Observed(observed) => Some(observed),
            _ => None,
        }
    }

    /// The underlying node of a raw value or a wrapper.
    pub fn target_node(&self) -> Option<Node> {
        match self {
            Value::Node(node) => Some(node.clone()),
            Value::Observed(observed) => Some(observed.target()),
            _ => None,
        }
    }

    /// The value with any wrapper removed.
    pub fn raw(&self) -> Value {
        match self {
            Value::Observed(observed) => Value::Node(observed.target()),
            other => other.clone(),
        }
    }

    pub fn kind(&self) -> Option<Kind> {
        self.target_node().map(|node| node.kind())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
            Value::Node(node) => node.kind().name(),
            Value::Observed(observed) => observed.target().kind().name(),
        }
    }

    /// Interprets the value as a map key.
    pub fn to_key(&self) -> Result<Key, Error> {
        match self {
            Value::String(s) => Ok(Key::Name(s.clone())),
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => {
                Ok(Key::Index(*n as usize))
            }
            Value::Symbol(symbol) => Ok(Key::Symbol(symbol.clone())),
            other => Err(Error::UnsupportedKey {
                kind: "map",
                key: other.to_display_string(),
            }),
        }
    }

    // ── Transparent accessors ──

    pub fn get(&self, key: impl Into<Key>) -> Result<Value, Error> {
        let key = key.into();
        match self {
            Value::Observed(observed) => observed.get(key),
            Value::Node(node) => node.get_with(&key, self),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Returns `Ok(false)` when the write was refused or vetoed.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool, Error> {
        let key = key.into();
        match self {
            Value::Observed(observed) => observed.set(key, value.into()),
            Value::Node(node) => node.set_with(&key, value.into(), self),
            _ => Err(Error::NotAnObject),
        }
    }

    pub fn delete(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let key = key.into();
        match self {
            Value::Observed(observed) => observed.delete(key),
            Value::Node(node) => node.delete(&key),
            _ => Err(Error::NotAnObject),
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> Result<bool, Error> {
        let key = key.into();
        self.target_node()
            .map(|node| node.has(&key))
            .ok_or(Error::NotAnObject)
    }

    pub fn define_property(&self, key: impl Into<Key>, descriptor: Descriptor) -> Result<bool, Error> {
        let key = key.into();
        match self {
            Value::Observed(observed) => observed.define_property(key, descriptor),
            Value::Node(node) => node.define_property(&key, descriptor),
            _ => Err(Error::NotAnObject),
        }
    }

    pub fn own_descriptor(&self, key: impl Into<Key>) -> Result<Option<Descriptor>, Error> {
        let key = key.into();
        self.target_node()
            .map(|node| node.own_descriptor(&key))
            .ok_or(Error::NotAnObject)
    }

    /// Calls a built-in operation or a function-valued property.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        match self {
            Value::Observed(observed) => observed.invoke(name, args),
            Value::Node(node) => builtins::invoke_raw(node, name, args),
            _ => Err(Error::NotAnObject),
        }
    }

    /// Reads through every key of `path`. A non-composite step ends the
    /// walk with `Undefined`.
    pub fn get_path(&self, path: &Path) -> Result<Value, Error> {
        let mut current = self.clone();
        for key in path.walk() {
            if !current.is_composite() {
                return Ok(Value::Undefined);
            }
            current = current.get(key.into_owned())?;
        }
        Ok(current)
    }

    // ── Views ──

    /// A JSON snapshot for display and tests.
    ///
    /// Undefined, functions and symbols are dropped from objects and
    /// become `null` in sequences. Non-finite numbers and revisited nodes
    /// become `null` as well.
    pub fn to_json(&self) -> serde_json::Value {
        json_of(self, &mut Vec::new())
    }

    /// String conversion as used by `join` and the default sort order.
    pub fn to_display_string(&self) -> String {
        display_of(self, &mut Vec::new())
    }
}

fn json_of(value: &Value, visiting: &mut Vec<NodeId>) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Undefined | Value::Null | Value::Symbol(_) | Value::Function(_) => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number_json(*n),
        Value::String(s) => Json::String(s.clone()),
        Value::Node(node) => node_json(node, visiting),
        Value::Observed(observed) => node_json(&observed.target(), visiting),
    }
}

fn node_json(node: &Node, visiting: &mut Vec<NodeId>) -> serde_json::Value {
    use serde_json::Value as Json;

    if visiting.contains(&node.id()) {
        return Json::Null;
    }
    visiting.push(node.id());
    // Snapshot first: getters may touch the node.
    let snapshot = node.borrow().clone();
    let out = match snapshot {
        Composite::Object(object) => {
            let mut out = serde_json::Map::new();
            for (key, descriptor) in object.properties {
                if !descriptor.enumerable || key.is_symbol() {
                    continue;
                }
                let value = match descriptor.slot {
                    Slot::Data { value, .. } => value,
                    Slot::Accessor { get: Some(getter), .. } => getter
                        .call(&Value::Node(node.clone()), &[])
                        .unwrap_or_default(),
                    Slot::Accessor { get: None, .. } => Value::Undefined,
                };
                if matches!(value, Value::Undefined | Value::Function(_) | Value::Symbol(_)) {
                    continue;
                }
                out.insert(key.to_string(), json_of(&value, visiting));
            }
            Json::Object(out)
        }
        Composite::Array(items) | Composite::Set(items) => {
            Json::Array(items.iter().map(|item| json_of(item, visiting)).collect())
        }
        Composite::Map(entries) => {
            let mut out = serde_json::Map::new();
            for (key, value) in entries {
                out.insert(key.to_string(), json_of(&value, visiting));
            }
            Json::Object(out)
        }
        Composite::Date(ms) => number_json(ms),
    };
    visiting.pop();
    out
}

fn number_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn display_of(value: &Value, visiting: &mut Vec<NodeId>) -> String {
    match value {
        Value::Undefined => "undefined".to_owned(),
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        Value::Symbol(symbol) => symbol.to_string(),
        Value::Function(function) => format!("function {}() {{ [native code] }}", function.name()),
        Value::Node(node) => node_display(node, visiting),
        Value::Observed(observed) => node_display(&observed.target(), visiting),
    }
}

fn node_display(node: &Node, visiting: &mut Vec<NodeId>) -> String {
    if visiting.contains(&node.id()) {
        return String::new();
    }
    let items = match &*node.borrow() {
        Composite::Object(_) => return "[object Object]".to_owned(),
        Composite::Set(_) => return "[object Set]".to_owned(),
        Composite::Map(_) => return "[object Map]".to_owned(),
        Composite::Date(ms) => return builtins::date_string(*ms),
        Composite::Array(items) => items.clone(),
    };
    visiting.push(node.id());
    let out = items
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                display_of(item, visiting)
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    visiting.pop();
    out
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Symbol> for Value {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Observed> for Value {
    fn from(observed: Observed) -> Self {
        Value::Observed(observed)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Name(name) => Value::String(name),
            Key::Index(index) => Value::Number(index as f64),
            Key::Symbol(symbol) => Value::Symbol(symbol),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Node(Node::array(items))
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Node(Node::new(Composite::Array(
                items.iter().map(Value::from).collect(),
            ))),
            Json::Object(entries) => Value::Node(Node::object_from(
                entries.iter().map(|(key, value)| (key.as_str(), Value::from(value))),
            )),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from(&json)
    }
}
