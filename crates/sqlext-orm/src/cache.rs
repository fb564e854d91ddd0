//! Query result caching.

use std::fmt;

use sqlext_model::Rows;

/// A cache of query results keyed by caller-chosen names.
///
/// Each entry records the table it was read from so that a successful write
/// can drop every entry that may now be stale.
pub trait ResponseCache: Send + Sync + fmt::Debug {
    /// Cached rows under `key`.
    fn get(&self, key: &str) -> Option<Rows>;

    /// Store `rows` read from `table` under `key`.
    fn set(&self, key: &str, table: &str, rows: Rows);

    /// Drop every entry read from `table`.
    fn invalidate_table(&self, table: &str);
}
