//! Model types for sqlext.
//!
//! These types describe what flows through the overlay: scalar [`Value`]s,
//! result [`Record`]s, write payloads ([`Data`]), counter directives, the
//! decoded [`AttributeBag`], and the rows of an extension table.

pub mod bag;
pub mod data;
pub mod extension;
pub mod value;

pub use bag::{AttributeBag, BAG_KEYS, strip_bag_keys};
pub use data::{Counter, Data, DataValue};
pub use extension::{AuditFields, ExtensionRow};
pub use value::{Record, Rows, Value};
