//! Observation settings.

use std::fmt;
use std::rc::Rc;

use on_change_path::{Key, PathForm};
use serde::Deserialize;

use crate::equal::same_value;
use crate::event::Change;
use crate::value::Value;

/// Decides whether a write changes anything. Defaults to SameValue.
#[derive(Clone)]
pub struct Comparator(Rc<dyn Fn(&Value, &Value) -> bool>);

impl Comparator {
    pub fn new<F>(equals: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        Comparator(Rc::new(equals))
    }

    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        (self.0)(a, b)
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::new(same_value)
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparator")
    }
}

/// The answer of a validation hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

impl From<bool> for Verdict {
    fn from(accept: bool) -> Self {
        if accept {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

/// Called with each proposed change before it is committed.
#[derive(Clone)]
pub struct Validator(Rc<dyn Fn(&Change) -> Verdict>);

impl Validator {
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&Change) -> Verdict + 'static,
    {
        Validator(Rc::new(validate))
    }

    pub fn validate(&self, change: &Change) -> Verdict {
        (self.0)(change)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Which operations attach [`OperationDetails`](crate::OperationDetails).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Details {
    Flag(bool),
    Only(Vec<String>),
}

impl Default for Details {
    fn default() -> Self {
        Details::Flag(false)
    }
}

impl Details {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Details::Flag(enabled) => *enabled,
            Details::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    #[serde(skip)]
    pub equals: Comparator,
    /// Track only the root's own properties.
    pub is_shallow: bool,
    /// Report paths as key sequences instead of dotted strings.
    pub path_as_array: bool,
    pub ignore_symbols: bool,
    pub ignore_underscores: bool,
    pub ignore_keys: Vec<Key>,
    /// Drop events from values no longer reachable at their recorded path.
    pub ignore_detached: bool,
    pub details: Details,
    #[serde(skip)]
    pub on_validate: Option<Validator>,
    /// Report a shared value once per live path instead of once.
    pub notify_aliases: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            equals: Comparator::default(),
            is_shallow: false,
            path_as_array: false,
            ignore_symbols: false,
            ignore_underscores: false,
            ignore_keys: Vec::new(),
            ignore_detached: false,
            details: Details::default(),
            on_validate: None,
            notify_aliases: true,
        }
    }
}

impl Options {
    /// Loads the plain settings from JSON. Callbacks are attached afterwards.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn equals<F>(mut self, equals: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + 'static,
    {
        self.equals = Comparator::new(equals);
        self
    }

    pub fn shallow(mut self, is_shallow: bool) -> Self {
        self.is_shallow = is_shallow;
        self
    }

    pub fn path_as_array(mut self, path_as_array: bool) -> Self {
        self.path_as_array = path_as_array;
        self
    }

    pub fn ignore_symbols(mut self, ignore: bool) -> Self {
        self.ignore_symbols = ignore;
        self
    }

    pub fn ignore_underscores(mut self, ignore: bool) -> Self {
        self.ignore_underscores = ignore;
        self
    }

    pub fn ignore_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.ignore_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_detached(mut self, ignore: bool) -> Self {
        self.ignore_detached = ignore;
        self
    }

    pub fn details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn on_validate<F, V>(mut self, validate: F) -> Self
    where
        F: Fn(&Change) -> V + 'static,
        V: Into<Verdict>,
    {
        self.on_validate = Some(Validator::new(move |change| validate(change).into()));
        self
    }

    pub fn notify_aliases(mut self, notify: bool) -> Self {
        self.notify_aliases = notify;
        self
    }

    pub(crate) fn path_form(&self) -> PathForm {
        if self.path_as_array {
            PathForm::Keys
        } else {
            PathForm::Joined
        }
    }

    /// Keys that are read raw and never reported.
    pub(crate) fn ignores(&self, key: &Key) -> bool {
        (self.ignore_symbols && key.is_symbol())
            || (self.ignore_underscores && key.is_underscored())
            || self.ignore_keys.iter().any(|ignored| ignored.matches(key))
    }
}
