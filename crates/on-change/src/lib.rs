//! on-change: deep mutation observation for nested values.
//!
//! [`observe`] wraps a value graph (objects, arrays, sets, maps and dates)
//! and reports every mutation made through the wrapper, however deep, as a
//! [`Change`] carrying the path from the root, the new value and the
//! previous one. Aggregate operations such as `sort` or `splice` produce a
//! single change for the whole collection. An optional validator can veto a
//! change, in which case the mutation is rolled back.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use on_change::{observe, Change, Options};
//! use serde_json::json;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let state = observe(
//!     json!({"user": {"name": "ada"}, "tags": ["b", "a"]}),
//!     move |change: &Change| sink.borrow_mut().push(change.to_json()),
//!     Options::default(),
//! );
//!
//! state.get("user").unwrap().set("name", "grace").unwrap();
//! state.get("tags").unwrap().invoke("sort", &[]).unwrap();
//!
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![
//!         json!({"path": "user.name", "value": "grace", "previous": "ada"}),
//!         json!({"path": "tags", "value": ["a", "b"], "previous": ["b", "a"]}),
//!     ]
//! );
//! ```

mod builtins;
mod cache;
mod tracker;

pub mod cli;
pub mod equal;
pub mod error;
pub mod event;
pub mod handles;
pub mod observe;
pub mod operation;
pub mod options;
pub mod value;

pub use on_change_path::{Key, Path, PathForm, Symbol, PATH_SEPARATOR};

pub use error::Error;
pub use event::{Change, OperationDetails};
pub use handles::{
    ObservedArray, ObservedDate, ObservedEntries, ObservedIter, ObservedMap, ObservedObject,
    ObservedSet,
};
pub use observe::{observe, unsubscribe, unwrap, Observed};
pub use operation::{classify, ChangeTest, Class, Operation};
pub use options::{Comparator, Details, Options, Validator, Verdict};
pub use value::{Composite, Descriptor, Function, Kind, Node, NodeId, Object, Slot, Value, WeakNode};
