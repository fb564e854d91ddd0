//! Test doubles for the executor and cache seams.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use sqlext_core::{SqlextConfig, SqlextError, SqlextResult};
use sqlext_model::{Record, Rows, Value};

use crate::cache::ResponseCache;
use crate::db::Db;
use crate::dialect::Dialect;
use crate::executor::{ExecResult, Executor};
use crate::statement::{InsertStatement, SelectStatement, UpdateStatement};

/// Scripted executor that records every statement it sees.
///
/// Updates whose filter mentions `row_key` are answered from `existing`
/// (`(row_key, field_code)` pairs); other updates match every scripted row.
#[derive(Debug, Default)]
pub(crate) struct FakeExecutor {
    pub dialect: Dialect,
    pub fields: HashMap<String, Vec<String>>,
    rows: Mutex<Rows>,
    pub existing: Mutex<BTreeSet<(i64, String)>>,
    pub fail_table: Option<String>,
    pub log: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<UpdateStatement>>,
    pub inserts: Mutex<Vec<InsertStatement>>,
    pub transactions: Mutex<usize>,
}

impl FakeExecutor {
    pub fn set_rows(&self, rows: Rows) {
        *self.rows.lock() = rows;
    }

    pub fn with_fields(mut self, table: &str, fields: &[&str]) -> Self {
        self.fields.insert(
            table.to_owned(),
            fields.iter().map(|f| (*f).to_owned()).collect(),
        );
        self
    }

    pub fn with_ids(self, ids: &[i64]) -> Self {
        self.set_rows(
            ids.iter()
                .map(|id| Record::from([("id".to_owned(), Value::Int(*id))]))
                .collect(),
        );
        self
    }

    fn check(&self, table: &str) -> SqlextResult<()> {
        if self.fail_table.as_deref() == Some(table) {
            return Err(SqlextError::database(format!("write to {table} refused")));
        }
        Ok(())
    }
}

impl Executor for FakeExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn query(&self, stmt: &SelectStatement) -> SqlextResult<Rows> {
        self.log.lock().push(stmt.to_sql(&self.dialect).sql);
        Ok(self.rows.lock().clone())
    }

    fn update(&self, stmt: &UpdateStatement) -> SqlextResult<ExecResult> {
        self.log.lock().push(stmt.to_sql(&self.dialect).sql);
        self.check(&stmt.table.name)?;
        self.updates.lock().push(stmt.clone());
        let affected = if stmt.filter.sql.contains("row_key") {
            let key = stmt.filter.args.first().and_then(Value::as_i64);
            let code = stmt.filter.args.get(1).and_then(Value::to_text);
            match (key, code) {
                (Some(k), Some(c)) => u64::from(self.existing.lock().contains(&(k, c))),
                _ => 0,
            }
        } else {
            self.rows.lock().len() as u64
        };
        Ok(ExecResult::affected(affected))
    }

    fn insert(&self, stmt: &InsertStatement) -> SqlextResult<ExecResult> {
        self.log.lock().push(stmt.to_sql(&self.dialect).sql);
        self.check(&stmt.table.name)?;
        self.inserts.lock().push(stmt.clone());
        Ok(ExecResult::affected(stmt.rows.len() as u64))
    }

    fn table_fields(&self, table: &str) -> SqlextResult<Option<Vec<String>>> {
        Ok(self.fields.get(table).cloned())
    }

    fn transaction(&self, body: &mut dyn FnMut() -> SqlextResult<()>) -> SqlextResult<()> {
        *self.transactions.lock() += 1;
        body()
    }
}

#[derive(Debug, Default)]
pub(crate) struct MapCache {
    entries: Mutex<HashMap<String, (String, Rows)>>,
}

impl ResponseCache for MapCache {
    fn get(&self, key: &str) -> Option<Rows> {
        self.entries.lock().get(key).map(|(_, rows)| rows.clone())
    }

    fn set(&self, key: &str, table: &str, rows: Rows) {
        self.entries
            .lock()
            .insert(key.to_owned(), (table.to_owned(), rows));
    }

    fn invalidate_table(&self, table: &str) {
        self.entries.lock().retain(|_, (t, _)| t != table);
    }
}

pub(crate) fn db_with(exec: FakeExecutor) -> Db {
    Db::new(Arc::new(exec), SqlextConfig::default())
}

pub(crate) fn shared_db(exec: FakeExecutor) -> (Db, Arc<FakeExecutor>) {
    let exec = Arc::new(exec);
    (
        Db::new(Arc::clone(&exec) as Arc<dyn Executor>, SqlextConfig::default()),
        exec,
    )
}

pub(crate) fn db_with_cache(exec: FakeExecutor) -> (Db, Arc<MapCache>) {
    let cache = Arc::new(MapCache::default());
    let db = db_with(exec).with_cache(Arc::clone(&cache) as Arc<dyn ResponseCache>);
    (db, cache)
}
