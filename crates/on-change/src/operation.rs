//! The fixed set of built-in operations and how each kind treats them.

use std::fmt;

use crate::value::Kind;

/// A built-in operation, named in `snake_case` at the invocation surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    // sequences
    Append,
    RemoveLast,
    RemoveFirst,
    Prepend,
    CopyWithin,
    Reverse,
    Sort,
    Splice,
    Flatten,
    Fill,
    Concat,
    Includes,
    IndexOf,
    LastIndexOf,
    Join,
    // collections
    Add,
    Set,
    Get,
    Has,
    Delete,
    Clear,
    ForEach,
    Size,
    Keys,
    Values,
    Entries,
    // dates
    SetTime,
    SetUtcHours,
    SetUtcMinutes,
    SetUtcSeconds,
    SetUtcMilliseconds,
    SetUtcDate,
    SetUtcMonth,
    SetUtcFullYear,
    GetTime,
    ValueOf,
    // everything
    HasOwnProperty,
    ToString,
}

const ALL: [Operation; 38] = [
    Operation::Append,
    Operation::RemoveLast,
    Operation::RemoveFirst,
    Operation::Prepend,
    Operation::CopyWithin,
    Operation::Reverse,
    Operation::Sort,
    Operation::Splice,
    Operation::Flatten,
    Operation::Fill,
    Operation::Concat,
    Operation::Includes,
    Operation::IndexOf,
    Operation::LastIndexOf,
    Operation::Join,
    Operation::Add,
    Operation::Set,
    Operation::Get,
    Operation::Has,
    Operation::Delete,
    Operation::Clear,
    Operation::ForEach,
    Operation::Size,
    Operation::Keys,
    Operation::Values,
    Operation::Entries,
    Operation::SetTime,
    Operation::SetUtcHours,
    Operation::SetUtcMinutes,
    Operation::SetUtcSeconds,
    Operation::SetUtcMilliseconds,
    Operation::SetUtcDate,
    Operation::SetUtcMonth,
    Operation::SetUtcFullYear,
    Operation::GetTime,
    Operation::ValueOf,
    Operation::HasOwnProperty,
    Operation::ToString,
];

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::RemoveLast => "remove_last",
            Operation::RemoveFirst => "remove_first",
            Operation::Prepend => "prepend",
            Operation::CopyWithin => "copy_within",
            Operation::Reverse => "reverse",
            Operation::Sort => "sort",
            Operation::Splice => "splice",
            Operation::Flatten => "flatten",
            Operation::Fill => "fill",
            Operation::Concat => "concat",
            Operation::Includes => "includes",
            Operation::IndexOf => "index_of",
            Operation::LastIndexOf => "last_index_of",
            Operation::Join => "join",
            Operation::Add => "add",
            Operation::Set => "set",
            Operation::Get => "get",
            Operation::Has => "has",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
            Operation::ForEach => "for_each",
            Operation::Size => "size",
            Operation::Keys => "keys",
            Operation::Values => "values",
            Operation::Entries => "entries",
            Operation::SetTime => "set_time",
            Operation::SetUtcHours => "set_utc_hours",
            Operation::SetUtcMinutes => "set_utc_minutes",
            Operation::SetUtcSeconds => "set_utc_seconds",
            Operation::SetUtcMilliseconds => "set_utc_milliseconds",
            Operation::SetUtcDate => "set_utc_date",
            Operation::SetUtcMonth => "set_utc_month",
            Operation::SetUtcFullYear => "set_utc_full_year",
            Operation::GetTime => "get_time",
            Operation::ValueOf => "value_of",
            Operation::HasOwnProperty => "has_own_property",
            Operation::ToString => "to_string",
        }
    }

    pub fn from_name(name: &str) -> Option<Operation> {
        ALL.iter().copied().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a bracketed call decides whether it changed its collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeTest {
    /// Always a change.
    Certain,
    /// Length or any element differs.
    Sequence,
    /// Size or membership differs.
    Set,
    /// Size, key presence or any value differs.
    Map,
    /// The timestamp differs under the configured equality.
    Date,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Mutating(ChangeTest),
    ReadOnly,
    /// Read-only, with every produced member wrapped.
    Iterator,
}

/// Classifies `op` for `kind`. `None` means the kind does not handle it.
pub fn classify(kind: Kind, op: Operation) -> Option<Class> {
    use Operation::*;

    let class = match (kind, op) {
        (_, HasOwnProperty | ToString) => Class::ReadOnly,

        (Kind::Array, Append | RemoveLast | RemoveFirst | Prepend) => {
            Class::Mutating(ChangeTest::Certain)
        }
        (Kind::Array, CopyWithin | Reverse | Sort | Splice | Flatten | Fill) => {
            Class::Mutating(ChangeTest::Sequence)
        }
        (Kind::Array, Concat | Includes | IndexOf | LastIndexOf | Join | Keys) => Class::ReadOnly,

        (Kind::Set, Add | Clear | Delete | ForEach) => Class::Mutating(ChangeTest::Set),
        (Kind::Set, Has | Size) => Class::ReadOnly,
        (Kind::Set, Keys | Values | Entries) => Class::Iterator,

        (Kind::Map, Set | Clear | Delete | ForEach) => Class::Mutating(ChangeTest::Map),
        (Kind::Map, Has | Get | Size) => Class::ReadOnly,
        (Kind::Map, Keys | Values | Entries) => Class::Iterator,

        (
            Kind::Date,
            SetTime | SetUtcHours | SetUtcMinutes | SetUtcSeconds | SetUtcMilliseconds
            | SetUtcDate | SetUtcMonth | SetUtcFullYear,
        ) => Class::Mutating(ChangeTest::Date),
        (Kind::Date, GetTime | ValueOf) => Class::ReadOnly,

        _ => return None,
    };
    Some(class)
}
