//! In-memory row storage for a single table.
//!
//! Rows live in a [`DashMap`] keyed by an internal row id that preserves
//! insertion order. Writes that must check uniqueness or touch several rows
//! hold the table's write lock; reads never block on it.
//!
//! # Architecture
//!
//! ```text
//! DashMap<RowId, Record>     rows
//! AtomicU64                  next row id
//! AtomicI64                  next auto-increment `id`
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use parking_lot::Mutex;
use sqlext_model::{Record, Value};
use sqlext_orm::OnConflict;
use sqlext_orm::condition::ConditionError;
use thiserror::Error;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Auto-increment column filled on insert when absent.
pub const AUTO_ID: &str = "id";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The table does not exist.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Table name.
        name: String,
    },
    /// A table with this name already exists.
    #[error("table already exists: {name}")]
    TableExists {
        /// Table name.
        name: String,
    },
    /// A statement references a column the table does not have.
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// An insert collides with a unique key.
    #[error("duplicate entry {key} for table '{table}'")]
    DuplicateKey {
        /// Table name.
        table: String,
        /// Colliding key values.
        key: String,
    },
    /// A condition or assignment failed to parse or evaluate.
    #[error(transparent)]
    Condition(#[from] ConditionError),
    /// The statement uses a construct the engine does not implement.
    #[error("unsupported: {message}")]
    Unsupported {
        /// Explanation.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Column layout and unique keys of a table.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct TableSchema {
    /// Table name.
    #[builder(setter(into))]
    pub name: String,
    /// Column names.
    pub columns: Vec<String>,
    /// Column sets that must be unique across rows. A table with an `id`
    /// column is always unique on it.
    #[builder(default)]
    pub unique_keys: Vec<Vec<String>>,
}

impl TableSchema {
    /// A schema over `columns` with no extra unique keys.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            unique_keys: Vec::new(),
        }
    }

    /// Add a unique key over `columns`.
    #[must_use]
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique_keys
            .push(columns.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    /// Whether the table has `column` (case-insensitive).
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    /// The table's spelling of `column`.
    #[must_use]
    pub fn canonical(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(column))
            .map(String::as_str)
    }

    fn all_unique_keys(&self) -> Vec<Vec<String>> {
        let mut keys = self.unique_keys.clone();
        if self.has_column(AUTO_ID) && !keys.iter().any(|k| k.len() == 1 && k[0] == AUTO_ID) {
            keys.insert(0, vec![AUTO_ID.to_owned()]);
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// TableStorage
// ---------------------------------------------------------------------------

/// What an insert did with one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was stored; carries its `id` if the table has one.
    Inserted(Option<i64>),
    /// An existing row was overwritten.
    Updated,
    /// The row collided and was skipped.
    Ignored,
}

/// A point-in-time copy of a table's rows.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    rows: BTreeMap<u64, Record>,
    next_row: u64,
    next_id: i64,
}

/// In-memory storage for a single table.
#[derive(Debug)]
pub struct TableStorage {
    schema: TableSchema,
    rows: DashMap<u64, Record>,
    next_row: AtomicU64,
    next_id: AtomicI64,
    write_lock: Mutex<()>,
}

impl TableStorage {
    /// Creates an empty table.
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: DashMap::new(),
            next_row: AtomicU64::new(1),
            next_id: AtomicI64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    /// The table's schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All rows in insertion order.
    #[must_use]
    pub fn scan(&self) -> Vec<Record> {
        let mut rows: Vec<(u64, Record)> = self
            .rows
            .iter()
            .map(|r| (*r.key(), r.value().clone()))
            .collect();
        rows.sort_unstable_by_key(|(k, _)| *k);
        rows.into_iter().map(|(_, r)| r).collect()
    }

    /// Check that every key of `columns` is a column of this table.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnknownColumn` for the first unknown key.
    pub fn validate_columns<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a String>,
    ) -> Result<(), StorageError> {
        for column in columns {
            if !self.schema.has_column(column) {
                return Err(StorageError::UnknownColumn {
                    table: self.schema.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Insert one row, resolving unique-key collisions per `on_conflict`.
    ///
    /// Columns the row lacks are stored as `NULL`; a missing `id` is
    /// assigned from the auto-increment counter.
    ///
    /// # Errors
    ///
    /// Returns `UnknownColumn` for columns outside the schema and
    /// `DuplicateKey` for a collision under [`OnConflict::Error`].
    pub fn insert(
        &self,
        record: Record,
        on_conflict: &OnConflict,
    ) -> Result<InsertOutcome, StorageError> {
        self.validate_columns(record.keys())?;
        let _guard = self.write_lock.lock();

        let mut row: Record = self
            .schema
            .columns
            .iter()
            .map(|c| (c.clone(), Value::Null))
            .collect();
        for (k, v) in record {
            let column = self.schema.canonical(&k).unwrap_or(k.as_str()).to_owned();
            row.insert(column, v);
        }

        if let Some((row_id, key)) = self.find_conflict(&row) {
            return match on_conflict {
                OnConflict::Error => Err(StorageError::DuplicateKey {
                    table: self.schema.name.clone(),
                    key,
                }),
                OnConflict::Ignore => {
                    debug!(table = %self.schema.name, key = %key, "ignored duplicate row");
                    Ok(InsertOutcome::Ignored)
                }
                OnConflict::Update { columns, .. } => {
                    if let Some(mut existing) = self.rows.get_mut(&row_id) {
                        for column in columns {
                            if let Some(v) = row.get(column) {
                                existing.insert(column.clone(), v.clone());
                            }
                        }
                    }
                    debug!(table = %self.schema.name, key = %key, "updated duplicate row");
                    Ok(InsertOutcome::Updated)
                }
            };
        }

        let id = self.assign_id(&mut row);
        let row_id = self.next_row.fetch_add(1, AtomicOrdering::Relaxed);
        self.rows.insert(row_id, row);
        debug!(table = %self.schema.name, row_id, "inserted row");
        Ok(InsertOutcome::Inserted(id))
    }

    /// Apply `change` to every row `matches` accepts; returns the match count.
    ///
    /// `change` returns the new values of the columns it modifies.
    ///
    /// # Errors
    ///
    /// Propagates the first error of either callback; rows changed before
    /// the error keep their changes.
    pub fn update_where(
        &self,
        mut matches: impl FnMut(&Record) -> Result<bool, StorageError>,
        mut change: impl FnMut(&Record) -> Result<Record, StorageError>,
    ) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock();
        let mut ids: Vec<u64> = self.rows.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();

        let mut affected = 0;
        for id in ids {
            let Some(mut row) = self.rows.get_mut(&id) else {
                continue;
            };
            if !matches(&row)? {
                continue;
            }
            let changes = change(&row)?;
            for (k, v) in changes {
                let column = self.schema.canonical(&k).unwrap_or(k.as_str()).to_owned();
                row.insert(column, v);
            }
            affected += 1;
        }
        debug!(table = %self.schema.name, affected, "updated rows");
        Ok(affected)
    }

    /// Copy the current rows and counters.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let _guard = self.write_lock.lock();
        TableSnapshot {
            rows: self
                .rows
                .iter()
                .map(|r| (*r.key(), r.value().clone()))
                .collect(),
            next_row: self.next_row.load(AtomicOrdering::Relaxed),
            next_id: self.next_id.load(AtomicOrdering::Relaxed),
        }
    }

    /// Replace the table's contents with `snapshot`.
    pub fn restore(&self, snapshot: TableSnapshot) {
        let _guard = self.write_lock.lock();
        self.rows.clear();
        for (k, v) in snapshot.rows {
            self.rows.insert(k, v);
        }
        self.next_row.store(snapshot.next_row, AtomicOrdering::Relaxed);
        self.next_id.store(snapshot.next_id, AtomicOrdering::Relaxed);
        debug!(table = %self.schema.name, rows = self.rows.len(), "restored snapshot");
    }

    fn assign_id(&self, row: &mut Record) -> Option<i64> {
        if !self.schema.has_column(AUTO_ID) {
            return None;
        }
        match row.get(AUTO_ID).and_then(Value::as_i64) {
            Some(id) => {
                self.next_id.fetch_max(id + 1, AtomicOrdering::Relaxed);
                Some(id)
            }
            None => {
                let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
                row.insert(AUTO_ID.to_owned(), Value::Int(id));
                Some(id)
            }
        }
    }

    /// The row id and key text of an existing row sharing a unique key
    /// with `row`. `NULL` key parts never collide.
    fn find_conflict(&self, row: &Record) -> Option<(u64, String)> {
        for key in self.schema.all_unique_keys() {
            let values: Option<Vec<&Value>> = key
                .iter()
                .map(|c| row.get(c).filter(|v| !v.is_null()))
                .collect();
            let Some(values) = values else {
                continue;
            };
            let hit = self.rows.iter().find(|existing| {
                key.iter().zip(&values).all(|(c, v)| {
                    existing
                        .get(c)
                        .and_then(|e| e.compare(v))
                        .is_some_and(|o| o.is_eq())
                })
            });
            if let Some(hit) = hit {
                let text = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("-");
                return Some((*hit.key(), format!("'{text}' for key ({})", key.join(","))));
            }
        }
        None
    }
}
