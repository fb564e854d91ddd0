//! sqlext demo - the extension-table overlay against in-memory tables.
//!
//! Creates a `user` table and its `user_extend` companion, then walks
//! through attribute writes, expanded reads and counters, printing a JSON
//! report of every step together with the SQL each step issued.
//!
//! # Usage
//!
//! ```text
//! LOG_LEVEL=debug SQLEXT_DIALECT=postgres sqlext-demo
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SQLEXT_DIALECT` | `mysql` | SQL dialect used to render statements |
//! | `SQLEXT_EXTEND_SUFFIX` | `_extend` | Extension table suffix |
//! | `SQLEXT_JOIN_ALIAS` | `ext` | Default join alias |
//! | `SQLEXT_TRANSACTIONAL` | `true` | Wrap attribute writes in a transaction |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlext_core::SqlextConfig;
use sqlext_memory::{MemoryCache, MemoryExecutor, TableSchema};
use sqlext_model::extension::{COLUMNS, FIELD_CODE, ROW_KEY};
use sqlext_model::{Data, Record, Rows, Value};
use sqlext_orm::{Db, Executor, InsertStatement, OnConflict, ResponseCache, TableRef};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// One step of the walkthrough.
#[derive(Debug, Serialize)]
struct Step {
    name: &'static str,
    result: serde_json::Value,
    statements: Vec<String>,
}

fn create_tables(executor: &MemoryExecutor, config: &SqlextConfig) -> Result<()> {
    executor.create_table(TableSchema::new(
        "user",
        &["id", "name", "score", "updated_at"],
    ))?;
    let ext_columns: Vec<&str> = std::iter::once("id").chain(COLUMNS).collect();
    executor.create_table(
        TableSchema::new(config.extend_table_for("user"), &ext_columns)
            .unique(&[ROW_KEY, FIELD_CODE]),
    )?;

    let users: Vec<Record> = ["Alice", "Bob", "Carol"]
        .into_iter()
        .map(|name| {
            Record::from([
                ("name".to_owned(), Value::from(name)),
                ("score".to_owned(), Value::Int(10)),
            ])
        })
        .collect();
    executor.insert(&InsertStatement {
        table: TableRef::bare("user"),
        rows: users,
        on_conflict: OnConflict::Error,
    })?;
    executor.insert(&InsertStatement {
        table: TableRef::bare(config.extend_table_for("user")),
        rows: vec![Record::from([
            (ROW_KEY.to_owned(), Value::Int(2)),
            (FIELD_CODE.to_owned(), Value::from("dept")),
            ("field_value".to_owned(), Value::from("sales")),
        ])],
        on_conflict: OnConflict::Error,
    })?;
    Ok(())
}

fn rows_json(rows: &Rows) -> serde_json::Value {
    serde_json::Value::Array(
        rows.iter()
            .map(|row| {
                serde_json::Value::Object(
                    row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                )
            })
            .collect(),
    )
}

fn main() -> Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    init_tracing(&log_level)?;

    let config = SqlextConfig::from_env().context("failed to load sqlext configuration")?;
    info!(dialect = %config.dialect, transactional = config.transactional, "starting sqlext demo");

    let executor = Arc::new(MemoryExecutor::new(config.dialect));
    create_tables(&executor, &config).context("failed to create demo tables")?;
    executor.clear_journal();

    let cache = Arc::new(MemoryCache::new());
    let db = Db::new(Arc::clone(&executor) as Arc<dyn Executor>, config)
        .with_cache(Arc::clone(&cache) as Arc<dyn ResponseCache>);

    let mut steps = Vec::new();
    let mut step = |name: &'static str, result: serde_json::Value| {
        steps.push(Step {
            name,
            result,
            statements: executor.statements(),
        });
        executor.clear_journal();
    };

    let out = db
        .model("user AS u")
        .expands()?
        .where_pri(1)
        .data(
            Data::map()
                .with("name", "A")
                .with("ext_data", r#"{"dept":"eng"}"#)
                .with("updated_by", 7),
        )
        .update_extend()?;
    step("insert missing attribute", serde_json::to_value(out)?);

    let out = db
        .model("user u")
        .expands()?
        .where_pri(2)
        .data(Data::map().with("ext_data", r#"{"dept":"eng","level":3}"#))
        .update_extend()?;
    step("update existing attribute", serde_json::to_value(out)?);

    let rows = db
        .model("user u")
        .expands()?
        .order_by("u.id")
        .cache("users:expanded")
        .all()?;
    step("read expanded rows", rows_json(&rows));

    let model = db.model("user u").where_pri(3);
    model.increment("score", 5)?;
    model.decrement("score", 5)?;
    let score = model.one()?.and_then(|r| r.get("score").cloned());
    step(
        "increment then decrement",
        score.map_or(serde_json::Value::Null, |v| v.to_json()),
    );

    let err = db
        .model("user u")
        .where_pri(1)
        .data(Data::map())
        .update()
        .map(|_| ())
        .map_err(|e| e.to_string());
    step("empty payload", serde_json::json!({ "error": err.err() }));

    let (hits, misses) = cache.stats();
    info!(hits, misses, steps = steps.len(), "demo finished");
    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}
