//! Locations inside an observed graph.

use std::borrow::Cow;
use std::fmt;
use std::iter::FusedIterator;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::key::Key;

/// Separator between keys in the joined form.
pub const PATH_SEPARATOR: char = '.';

/// Which representation paths use. Chosen once per observed root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PathForm {
    /// `"a.b.0"`; the root is `""`.
    #[default]
    Joined,
    /// `[a, b, 0]`; the root is `[]`.
    Keys,
}

/// A path from the observed root to a location in the graph.
///
/// Both forms support the same operations; mixing forms is tolerated by
/// converting the argument to the receiver's form, but a single root never
/// produces both.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    Joined(String),
    Keys(Vec<Key>),
}

impl Default for Path {
    fn default() -> Self {
        Path::root(PathForm::Joined)
    }
}

impl Path {
    pub fn root(form: PathForm) -> Self {
        match form {
            PathForm::Joined => Path::Joined(String::new()),
            PathForm::Keys => Path::Keys(Vec::new()),
        }
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Path::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Splits dotted `text` into a path of the requested form.
    ///
    /// In the key form, canonical integers become [`Key::Index`].
    pub fn parse(form: PathForm, text: &str) -> Self {
        match form {
            PathForm::Joined => Path::Joined(text.to_owned()),
            PathForm::Keys => Path::Keys(
                Path::Joined(text.to_owned())
                    .walk()
                    .map(|key| key.to_index_key())
                    .collect(),
            ),
        }
    }

    pub fn form(&self) -> PathForm {
        match self {
            Path::Joined(_) => PathForm::Joined,
            Path::Keys(_) => PathForm::Keys,
        }
    }

    pub fn is_root(&self) -> bool {
        match self {
            Path::Joined(text) => text.is_empty(),
            Path::Keys(keys) => keys.is_empty(),
        }
    }

    /// Number of keys in the path.
    pub fn len(&self) -> usize {
        match self {
            Path::Joined(_) => self.walk().count(),
            Path::Keys(keys) => keys.len(),
        }
    }

    /// Appends `key`. Appending the absent key returns the path unchanged.
    pub fn concat(&self, key: &Key) -> Path {
        if key.is_absent() {
            return self.clone();
        }
        match self {
            Path::Joined(text) => {
                let key = key.to_string();
                let mut out = String::with_capacity(text.len() + key.len() + 1);
                out.push_str(text);
                if !text.is_empty() {
                    out.push(PATH_SEPARATOR);
                }
                out.push_str(&key);
                Path::Joined(out)
            }
            Path::Keys(keys) => {
                let mut out = Vec::with_capacity(keys.len() + 1);
                out.extend(keys.iter().cloned());
                out.push(key.clone());
                Path::Keys(out)
            }
        }
    }

    /// The part of `self` that follows the prefix `sub_path`.
    pub fn after(&self, sub_path: &Path) -> Path {
        match self {
            Path::Joined(text) => {
                let sub = sub_path.joined();
                if sub.is_empty() {
                    return self.clone();
                }
                Path::Joined(text.get(sub.len() + 1..).unwrap_or_default().to_owned())
            }
            Path::Keys(keys) => {
                let skip = sub_path.len().min(keys.len());
                Path::Keys(keys[skip..].to_vec())
            }
        }
    }

    /// Everything but the last key. The root's initial is the root.
    pub fn initial(&self) -> Path {
        match self {
            Path::Joined(text) => match text.rfind(PATH_SEPARATOR) {
                Some(index) => Path::Joined(text[..index].to_owned()),
                None => Path::Joined(String::new()),
            },
            Path::Keys(keys) => Path::Keys(keys[..keys.len().saturating_sub(1)].to_vec()),
        }
    }

    /// The last key, or the absent key on the root.
    pub fn last(&self) -> Key {
        match self {
            Path::Joined(text) => match text.rfind(PATH_SEPARATOR) {
                Some(index) => Key::Name(text[index + 1..].to_owned()),
                None => Key::Name(text.clone()),
            },
            Path::Keys(keys) => keys.last().cloned().unwrap_or_else(Key::absent),
        }
    }

    /// Visits the keys left to right.
    pub fn walk(&self) -> Walk<'_> {
        let inner = match self {
            Path::Joined(text) if text.is_empty() => WalkInner::Joined(None),
            Path::Joined(text) => WalkInner::Joined(Some(text)),
            Path::Keys(keys) => WalkInner::Keys(keys.iter()),
        };
        Walk { inner }
    }

    /// True if `self` equals `sub_path` or extends it at a key boundary.
    pub fn is_sub_path(&self, sub_path: &Path) -> bool {
        match self {
            Path::Joined(text) => {
                let sub = sub_path.joined();
                if sub.is_empty() || *text == *sub {
                    return true;
                }
                text.len() > sub.len()
                    && text.starts_with(sub.as_ref())
                    && text.as_bytes()[sub.len()] == PATH_SEPARATOR as u8
            }
            Path::Keys(keys) => {
                let sub = sub_path.keys();
                keys.len() >= sub.len() && keys.iter().zip(sub.iter()).all(|(a, b)| a == b)
            }
        }
    }

    /// True if `other` lies strictly below `self`.
    pub fn is_strict_ancestor_of(&self, other: &Path) -> bool {
        other.len() > self.len() && other.is_sub_path(self)
    }

    /// Converts to `form`. Going from keys to joined text is lossy: symbol
    /// keys and names containing the separator no longer walk back to the
    /// same keys.
    pub fn to_form(&self, form: PathForm) -> Path {
        match (self, form) {
            (Path::Joined(_), PathForm::Joined) | (Path::Keys(_), PathForm::Keys) => self.clone(),
            (Path::Keys(_), PathForm::Joined) => Path::Joined(self.to_string()),
            (Path::Joined(_), PathForm::Keys) => Path::Keys(self.to_keys()),
        }
    }

    pub fn to_keys(&self) -> Vec<Key> {
        self.keys().into_owned()
    }

    fn joined(&self) -> Cow<'_, str> {
        match self {
            Path::Joined(text) => Cow::Borrowed(text),
            Path::Keys(_) => Cow::Owned(self.to_string()),
        }
    }

    fn keys(&self) -> Cow<'_, [Key]> {
        match self {
            Path::Keys(keys) => Cow::Borrowed(keys),
            Path::Joined(_) => Cow::Owned(self.walk().map(Cow::into_owned).collect()),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Joined(text) => f.write_str(text),
            Path::Keys(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{PATH_SEPARATOR}")?;
                    }
                    write!(f, "{key}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        Path::Joined(text.to_owned())
    }
}

impl From<Vec<Key>> for Path {
    fn from(keys: Vec<Key>) -> Self {
        Path::Keys(keys)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Path::Joined(text) => serializer.serialize_str(text),
            Path::Keys(keys) => {
                let mut seq = serializer.serialize_seq(Some(keys.len()))?;
                for key in keys {
                    seq.serialize_element(key)?;
                }
                seq.end()
            }
        }
    }
}

/// Iterator returned by [`Path::walk`].
///
/// The joined form is scanned separator by separator; nothing is split up
/// front.
pub struct Walk<'a> {
    inner: WalkInner<'a>,
}

enum WalkInner<'a> {
    Joined(Option<&'a str>),
    Keys(std::slice::Iter<'a, Key>),
}

impl<'a> Iterator for Walk<'a> {
    type Item = Cow<'a, Key>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            WalkInner::Keys(iter) => iter.next().map(Cow::Borrowed),
            WalkInner::Joined(rest) => {
                let text = rest.take()?;
                let segment = match text.find(PATH_SEPARATOR) {
                    Some(index) => {
                        let tail = &text[index + 1..];
                        // A trailing separator ends the walk.
                        if !tail.is_empty() {
                            *rest = Some(tail);
                        }
                        &text[..index]
                    }
                    None => text,
                };
                Some(Cow::Owned(Key::Name(segment.to_owned())))
            }
        }
    }
}

impl FusedIterator for Walk<'_> {}
