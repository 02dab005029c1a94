//! Property keys and paths for on-change-rs.
//!
//! A [`Path`] names a location inside an observed graph relative to its
//! root. It comes in two forms, chosen once per root: a dot-joined string
//! (`"list.0.name"`) or a sequence of [`Key`]s.
//!
//! # Example
//!
//! ```
//! use on_change_path::{Key, Path};
//!
//! let path = Path::from("list").concat(&Key::Index(0));
//! assert_eq!(path, Path::from("list.0"));
//! assert_eq!(path.after(&Path::from("list")), Path::from("0"));
//! assert_eq!(path.last(), Key::from("0"));
//! assert!(path.is_sub_path(&Path::from("list")));
//! ```

pub mod key;
pub mod path;

pub use key::{Key, Symbol};
pub use path::{Path, PathForm, Walk, PATH_SEPARATOR};
