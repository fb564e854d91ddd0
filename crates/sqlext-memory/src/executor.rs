//! [`Executor`] over in-memory tables.

use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::{Mutex, ReentrantMutex};
use sqlext_core::{DialectKind, SqlextError, SqlextResult};
use sqlext_model::{Data, DataValue, Record, Rows};
use sqlext_orm::condition::{EvalContext, arith, parse_assignments, parse_condition};
use sqlext_orm::condition::ast::ArithOp;
use sqlext_orm::{
    Dialect, ExecResult, Executor, InsertStatement, SelectStatement, UpdateStatement,
};
use tracing::{debug, warn};

use crate::query::{RowScope, run_select};
use crate::state::MemoryState;
use crate::storage::{InsertOutcome, StorageError, TableSchema, TableStorage};

impl From<StorageError> for SqlextError {
    fn from(err: StorageError) -> Self {
        Self::database(err.to_string()).with_source(err)
    }
}

/// Runs statements against a [`MemoryState`].
///
/// Every statement is rendered in the configured dialect and kept in a
/// journal, so callers can inspect exactly what a real database would
/// have received. Transactions snapshot all tables and restore them when
/// the body fails; they serialize with each other but not with writes
/// made outside a transaction.
#[derive(Debug)]
pub struct MemoryExecutor {
    state: Arc<MemoryState>,
    dialect: Dialect,
    journal: Mutex<Vec<String>>,
    tx_lock: ReentrantMutex<()>,
    failing: DashSet<String>,
    unreported: DashSet<String>,
}

impl MemoryExecutor {
    /// An executor over an empty database.
    #[must_use]
    pub fn new(dialect: DialectKind) -> Self {
        Self::with_state(Arc::new(MemoryState::new()), dialect)
    }

    /// An executor over existing tables.
    #[must_use]
    pub fn with_state(state: Arc<MemoryState>, dialect: DialectKind) -> Self {
        Self {
            state,
            dialect: Dialect::new(dialect),
            journal: Mutex::new(Vec::new()),
            tx_lock: ReentrantMutex::new(()),
            failing: DashSet::new(),
            unreported: DashSet::new(),
        }
    }

    /// The underlying tables.
    #[must_use]
    pub fn state(&self) -> &Arc<MemoryState> {
        &self.state
    }

    /// Create a table.
    ///
    /// # Errors
    ///
    /// Returns a `Database` error if the table exists.
    pub fn create_table(&self, schema: TableSchema) -> SqlextResult<Arc<TableStorage>> {
        debug!(table = %schema.name, columns = schema.columns.len(), "create table");
        Ok(self.state.create_table(schema)?)
    }

    /// Rendered SQL of every statement run so far.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Forget the journal.
    pub fn clear_journal(&self) {
        self.journal.lock().clear();
    }

    /// Make the next write to `table` fail with a `Database` error.
    pub fn fail_next_write(&self, table: &str) {
        self.failing.insert(table.to_owned());
    }

    /// Apply the next update of `table` but report zero affected rows, the
    /// way MySQL answers an update that leaves every value unchanged.
    pub fn unreport_next_update(&self, table: &str) {
        self.unreported.insert(table.to_owned());
    }

    fn record(&self, sql: String) {
        debug!(sql = %sql, "execute");
        self.journal.lock().push(sql);
    }

    fn check_failure(&self, table: &str) -> SqlextResult<()> {
        if self.failing.remove(table).is_some() {
            warn!(table = %table, "injected write failure");
            return Err(SqlextError::database(format!(
                "write to table '{table}' failed"
            )));
        }
        Ok(())
    }
}

impl Executor for MemoryExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(&self, stmt: &SelectStatement) -> SqlextResult<Rows> {
        self.record(stmt.to_sql(&self.dialect).sql);
        Ok(run_select(&self.state, stmt, &self.dialect)?)
    }

    fn update(&self, stmt: &UpdateStatement) -> SqlextResult<ExecResult> {
        self.record(stmt.to_sql(&self.dialect).sql);
        self.check_failure(&stmt.table.name)?;
        let table = self.state.require_table(&stmt.table.name)?;
        let condition = parse_condition(&stmt.filter.sql).map_err(StorageError::from)?;
        let args = stmt.filter.args.as_slice();

        let affected = match &stmt.data {
            Data::Map(map) => {
                table.validate_columns(map.keys())?;
                table.update_where(
                    |row| {
                        let scope = RowScope {
                            table: &stmt.table,
                            row,
                        };
                        Ok(EvalContext { scope: &scope, args }.evaluate(&condition)?)
                    },
                    |row| apply_map(map, row),
                )?
            }
            Data::Raw(raw) => {
                let assignments = parse_assignments(raw).map_err(StorageError::from)?;
                let names: Vec<String> =
                    assignments.iter().map(|a| a.column.name.clone()).collect();
                table.validate_columns(&names)?;
                table.update_where(
                    |row| {
                        let scope = RowScope {
                            table: &stmt.table,
                            row,
                        };
                        Ok(EvalContext { scope: &scope, args }.evaluate(&condition)?)
                    },
                    |row| {
                        let scope = RowScope {
                            table: &stmt.table,
                            row,
                        };
                        Ok(EvalContext {
                            scope: &scope,
                            args: &[],
                        }
                        .apply(&assignments)?)
                    },
                )?
            }
        };
        if self.unreported.remove(&stmt.table.name).is_some() {
            debug!(table = %stmt.table.name, affected, "update reported as unchanged");
            return Ok(ExecResult::affected(0));
        }
        Ok(ExecResult::affected(affected))
    }

    fn insert(&self, stmt: &InsertStatement) -> SqlextResult<ExecResult> {
        self.record(stmt.to_sql(&self.dialect).sql);
        self.check_failure(&stmt.table.name)?;
        let table = self.state.require_table(&stmt.table.name)?;
        let mut result = ExecResult::default();
        for row in &stmt.rows {
            match table.insert(row.clone(), &stmt.on_conflict)? {
                InsertOutcome::Inserted(id) => {
                    result.rows_affected += 1;
                    result.last_insert_id = id.or(result.last_insert_id);
                }
                InsertOutcome::Updated => result.rows_affected += 1,
                InsertOutcome::Ignored => {}
            }
        }
        Ok(result)
    }

    fn table_fields(&self, table: &str) -> SqlextResult<Option<Vec<String>>> {
        Ok(self
            .state
            .get_table(table)
            .map(|t| t.schema().columns.clone()))
    }

    fn transaction(&self, body: &mut dyn FnMut() -> SqlextResult<()>) -> SqlextResult<()> {
        let _guard = self.tx_lock.lock();
        let snapshot = self.state.snapshot();
        self.record("BEGIN".to_owned());
        match body() {
            Ok(()) => {
                self.record("COMMIT".to_owned());
                Ok(())
            }
            Err(err) => {
                self.state.restore(snapshot);
                self.record("ROLLBACK".to_owned());
                warn!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }
}

/// New values for a mapping payload; counters add their delta to the
/// current value.
fn apply_map(
    map: &std::collections::BTreeMap<String, DataValue>,
    row: &Record,
) -> Result<Record, StorageError> {
    map.iter()
        .map(|(column, value)| {
            let v = match value {
                DataValue::Set(v) => v.clone(),
                DataValue::Counter(c) => {
                    let current = row.get(&c.field).cloned().unwrap_or_default();
                    arith(&current, ArithOp::Add, &c.delta())?
                }
            };
            Ok((column.clone(), v))
        })
        .collect()
}
