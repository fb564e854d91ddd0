//! Integration tests for sqlext models.
//!
//! Every test builds its own in-memory database: a `user` table and its
//! `user_extend` companion, wired to a [`Db`] with a [`MemoryCache`].
//!
//! Run them with:
//! ```text
//! cargo test -p sqlext-integration
//! ```

use std::sync::{Arc, Once};

use sqlext_core::SqlextConfig;
use sqlext_memory::{MemoryCache, MemoryExecutor, TableSchema};
use sqlext_model::extension::{COLUMNS, FIELD_CODE, FIELD_VALUE, ROW_KEY};
use sqlext_model::{Record, Rows, Value};
use sqlext_orm::{Db, Executor, InsertStatement, OnConflict, ResponseCache, TableRef};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Base table used by every test.
pub const USER: &str = "user";
/// Its extension table.
pub const USER_EXTEND: &str = "user_extend";

/// A database with empty `user` and `user_extend` tables.
#[derive(Debug)]
pub struct Fixture {
    /// Entry point for models.
    pub db: Db,
    /// The executor behind `db`.
    pub executor: Arc<MemoryExecutor>,
    /// The cache behind `db`.
    pub cache: Arc<MemoryCache>,
}

impl Fixture {
    /// Fixture with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SqlextConfig::default())
    }

    /// Fixture with `config`.
    #[must_use]
    pub fn with_config(config: SqlextConfig) -> Self {
        init_tracing();
        let executor = Arc::new(MemoryExecutor::new(config.dialect));
        executor
            .create_table(TableSchema::new(
                USER,
                &["id", "name", "score", "updated_at"],
            ))
            .unwrap_or_else(|e| panic!("failed to create {USER}: {e}"));
        let ext_columns: Vec<&str> = std::iter::once("id").chain(COLUMNS).collect();
        executor
            .create_table(
                TableSchema::new(USER_EXTEND, &ext_columns).unique(&[ROW_KEY, FIELD_CODE]),
            )
            .unwrap_or_else(|e| panic!("failed to create {USER_EXTEND}: {e}"));

        let cache = Arc::new(MemoryCache::new());
        let db = Db::new(Arc::clone(&executor) as Arc<dyn Executor>, config)
            .with_cache(Arc::clone(&cache) as Arc<dyn ResponseCache>);
        Self {
            db,
            executor,
            cache,
        }
    }

    /// Insert users with the given names; ids are assigned from 1.
    pub fn seed_users(&self, names: &[&str]) {
        let rows = names
            .iter()
            .map(|name| {
                Record::from([
                    ("name".to_owned(), Value::from(*name)),
                    ("score".to_owned(), Value::Int(10)),
                ])
            })
            .collect();
        self.insert(USER, rows);
    }

    /// Insert one extension attribute.
    pub fn seed_attribute(&self, row_key: i64, code: &str, value: &str) {
        self.insert(
            USER_EXTEND,
            vec![Record::from([
                (ROW_KEY.to_owned(), Value::Int(row_key)),
                (FIELD_CODE.to_owned(), Value::from(code)),
                (FIELD_VALUE.to_owned(), Value::from(value)),
            ])],
        );
    }

    fn insert(&self, table: &str, rows: Vec<Record>) {
        self.executor
            .insert(&InsertStatement {
                table: TableRef::bare(table),
                rows,
                on_conflict: OnConflict::Error,
            })
            .unwrap_or_else(|e| panic!("failed to seed {table}: {e}"));
        self.executor.clear_journal();
    }

    /// All rows of `table` in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Rows {
        self.executor
            .state()
            .require_table(table)
            .map(|t| t.scan())
            .unwrap_or_default()
    }

    /// The user with `id`.
    #[must_use]
    pub fn user(&self, id: i64) -> Record {
        self.rows(USER)
            .into_iter()
            .find(|r| r.get("id") == Some(&Value::Int(id)))
            .unwrap_or_else(|| panic!("no user {id}"))
    }

    /// `(row_key, field_code, field_value)` of every extension row, sorted.
    #[must_use]
    pub fn attributes(&self) -> Vec<(i64, String, Value)> {
        let mut out: Vec<_> = self
            .rows(USER_EXTEND)
            .into_iter()
            .map(|r| {
                (
                    r.get(ROW_KEY).and_then(Value::as_i64).unwrap_or_default(),
                    r.get(FIELD_CODE)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    r.get(FIELD_VALUE).cloned().unwrap_or_default(),
                )
            })
            .collect();
        out.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        out
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

mod test_counter;
mod test_expand;
mod test_extend;
mod test_update;
