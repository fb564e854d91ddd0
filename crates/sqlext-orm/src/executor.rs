//! The execution seam between models and a database.

use std::fmt;

use sqlext_core::SqlextResult;
use sqlext_model::Rows;

use crate::dialect::Dialect;
use crate::statement::{InsertStatement, SelectStatement, UpdateStatement};

/// Outcome of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Rows the statement matched.
    pub rows_affected: u64,
    /// Id assigned to the last inserted row, if any.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    /// A result reporting `rows_affected` and no insert id.
    #[must_use]
    pub const fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }
}

/// Runs statements against a store.
///
/// Implementations report failures as `Database` errors.
pub trait Executor: Send + Sync + fmt::Debug {
    /// Dialect statements are rendered in.
    fn dialect(&self) -> Dialect;

    /// Run a `SELECT`.
    fn query(&self, stmt: &SelectStatement) -> SqlextResult<Rows>;

    /// Run an `UPDATE`; `rows_affected` counts matched rows.
    fn update(&self, stmt: &UpdateStatement) -> SqlextResult<ExecResult>;

    /// Run an `INSERT`.
    fn insert(&self, stmt: &InsertStatement) -> SqlextResult<ExecResult>;

    /// Column names of `table`, or `None` when the executor cannot tell.
    fn table_fields(&self, table: &str) -> SqlextResult<Option<Vec<String>>>;

    /// Run `body` atomically: if it returns an error, none of its writes
    /// remain visible.
    fn transaction(&self, body: &mut dyn FnMut() -> SqlextResult<()>) -> SqlextResult<()>;
}
