//! Property keys.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// A unique, non-string property key.
///
/// Two symbols are equal only if they were produced by the same call to
/// [`Symbol::new`]; the description is informational.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})#{}", self.description, self.id)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// A single step in a [`Path`](crate::Path).
///
/// Object properties are addressed by [`Key::Name`] or [`Key::Symbol`],
/// sequence elements by [`Key::Index`]. The empty name is the "absent" key:
/// appending it to a path is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Name(String),
    Index(usize),
    Symbol(Symbol),
}

impl Key {
    #[inline]
    pub fn name(name: impl Into<String>) -> Self {
        Key::Name(name.into())
    }

    #[inline]
    pub fn index(index: usize) -> Self {
        Key::Index(index)
    }

    /// The empty key, returned by `last()` on a root path.
    #[inline]
    pub fn absent() -> Self {
        Key::Name(String::new())
    }

    /// The `length` key of sequences.
    #[inline]
    pub fn length() -> Self {
        Key::Name("length".to_owned())
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Key::Name(name) if name.is_empty())
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Key::Symbol(_))
    }

    /// True for names starting with `_`. Only names can carry the prefix.
    #[inline]
    pub fn is_underscored(&self) -> bool {
        matches!(self, Key::Name(name) if name.starts_with('_'))
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the sequence index this key addresses, if any.
    ///
    /// Names count only when they are canonical non-negative integers
    /// (`"0"`, `"17"`, never `"01"` or `"-1"`).
    pub fn to_index(&self) -> Option<usize> {
        match self {
            Key::Index(index) => Some(*index),
            Key::Name(name) if is_canonical_index(name) => name.parse().ok(),
            _ => None,
        }
    }

    /// Returns the key with indices spelled as names, the form object
    /// property tables use.
    pub fn to_name_key(&self) -> Key {
        match self {
            Key::Index(index) => Key::Name(index.to_string()),
            other => other.clone(),
        }
    }

    /// Returns the key with canonical numeric names turned into indices.
    pub fn to_index_key(&self) -> Key {
        match self.to_index() {
            Some(index) => Key::Index(index),
            None => self.clone(),
        }
    }

    /// Loose equality used by block-lists: symbols compare by identity,
    /// everything else by its textual spelling.
    pub fn matches(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Symbol(a), Key::Symbol(b)) => a == b,
            (Key::Symbol(_), _) | (_, Key::Symbol(_)) => false,
            (a, b) => a == b || a.to_string() == b.to_string(),
        }
    }
}

fn is_canonical_index(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let bytes = name.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
            Key::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Key::Name(name) => serializer.serialize_str(name),
            Key::Index(index) => serializer.serialize_u64(*index as u64),
            Key::Symbol(symbol) => serializer.collect_str(symbol),
        }
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a property name or a non-negative index")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
                Ok(Key::Name(v.to_owned()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Key, E> {
                Ok(Key::Name(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Key, E> {
                usize::try_from(v)
                    .map(Key::Index)
                    .map_err(|_| E::custom("index out of range"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Key, E> {
                usize::try_from(v)
                    .map(Key::Index)
                    .map_err(|_| E::custom("index must be non-negative"))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}
