use thiserror::Error;

/// Failures raised by the value model.
///
/// The observer adds none of its own: every variant is something the
/// underlying value would report when operated on directly. A rejected
/// validation is not an error; the mutating accessor returns `Ok(false)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("value is not an object")]
    NotAnObject,
    #[error("expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{kind} does not support key {key}")]
    UnsupportedKey { kind: &'static str, key: String },
    #[error("{kind} has no operation {name:?}")]
    UnsupportedOperation { kind: &'static str, name: String },
    #[error("{0} is not a function")]
    NotCallable(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("callback failed: {0}")]
    Callback(String),
    #[error("invalid path: {0}")]
    Path(String),
}

impl Error {
    /// Shorthand for user callbacks that want to fail.
    pub fn callback(message: impl Into<String>) -> Self {
        Error::Callback(message.into())
    }
}
