//! Table registry.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::storage::{StorageError, TableSchema, TableSnapshot, TableStorage};

/// All tables of one in-memory database, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryState {
    tables: DashMap<String, Arc<TableStorage>>,
}

impl MemoryState {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Arc<TableStorage>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Get a table or return `TableNotFound`.
    pub fn require_table(&self, name: &str) -> Result<Arc<TableStorage>, StorageError> {
        self.get_table(name)
            .ok_or_else(|| StorageError::TableNotFound {
                name: name.to_owned(),
            })
    }

    /// Create a table. Returns an error if the name is taken.
    pub fn create_table(&self, schema: TableSchema) -> Result<Arc<TableStorage>, StorageError> {
        match self.tables.entry(schema.name.clone()) {
            Entry::Occupied(e) => Err(StorageError::TableExists {
                name: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                let table = Arc::new(TableStorage::new(schema));
                e.insert(Arc::clone(&table));
                Ok(table)
            }
        }
    }

    /// Remove a table by name.
    pub fn drop_table(&self, name: &str) -> Result<Arc<TableStorage>, StorageError> {
        self.tables
            .remove(name)
            .map(|(_, t)| t)
            .ok_or_else(|| StorageError::TableNotFound {
                name: name.to_owned(),
            })
    }

    /// List all table names (sorted).
    #[must_use]
    pub fn list_table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Copy every table's rows.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Arc<TableStorage>, TableSnapshot)> {
        let tables: Vec<Arc<TableStorage>> =
            self.tables.iter().map(|r| Arc::clone(r.value())).collect();
        tables
            .into_iter()
            .map(|t| {
                let snap = t.snapshot();
                (t, snap)
            })
            .collect()
    }

    /// Put back rows captured by [`MemoryState::snapshot`].
    pub fn restore(&self, snapshot: Vec<(Arc<TableStorage>, TableSnapshot)>) {
        for (table, snap) in snapshot {
            table.restore(snap);
        }
    }

    /// Remove all tables.
    pub fn reset(&self) {
        self.tables.clear();
    }
}
