//! The chainable model builder.
//!
//! A [`Model`] accumulates a table, conditions, read options, and a write
//! payload, then runs one statement. Builder methods consume and return the
//! model; operations borrow it, so one configured model can run several
//! statements.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use sqlext_core::{SqlextConfig, SqlextError, SqlextResult};
use sqlext_model::extension::{FIELD_CODE, FIELD_VALUE, ROW_KEY};
use sqlext_model::{Data, Record, Rows, Value};
use tracing::debug;

use crate::alias::TableRef;
use crate::cache::ResponseCache;
use crate::condition::ColumnRef;
use crate::condition::ast::LogicalOp;
use crate::executor::Executor;
use crate::statement::{Filter, Join, JoinKind, JsonAggregate, Rendered, SelectStatement};

/// Primary key column of base tables.
pub const PRIMARY_KEY: &str = "id";

/// The extension table joined by the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Bare extension table name.
    pub table: String,
    /// Alias the extension table is joined under.
    pub alias: String,
}

/// A rendered condition, split the way update guards inspect it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormattedCondition {
    /// `" WHERE ..."`, or empty when there are no conditions.
    pub where_clause: String,
    /// Trailing `ORDER BY` / `LIMIT` / `OFFSET` clauses.
    pub extra: String,
    /// Placeholder values of `where_clause`.
    pub args: Vec<Value>,
}

impl FormattedCondition {
    /// Whether the rendered text carries a `WHERE` keyword.
    #[must_use]
    pub fn has_where(&self) -> bool {
        format!("{}{}", self.where_clause, self.extra)
            .to_ascii_uppercase()
            .contains(" WHERE ")
    }
}

#[derive(Debug, Clone)]
struct WhereClause {
    joiner: LogicalOp,
    sql: String,
    args: Vec<Value>,
}

/// Query and write builder bound to one table.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) cache: Option<Arc<dyn ResponseCache>>,
    pub(crate) config: Arc<SqlextConfig>,
    pub(crate) tables: String,
    pub(crate) fields: String,
    wheres: Vec<WhereClause>,
    order_by: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
    pub(crate) data: Option<Data>,
    pub(crate) unscoped: bool,
    pub(crate) expansion: Option<Expansion>,
    pub(crate) extend_table: Option<String>,
    cache_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Construction and builder methods
// ---------------------------------------------------------------------------

impl Model {
    pub(crate) fn new(
        executor: Arc<dyn Executor>,
        cache: Option<Arc<dyn ResponseCache>>,
        config: Arc<SqlextConfig>,
        tables: &str,
    ) -> Self {
        Self {
            executor,
            cache,
            config,
            tables: tables.trim().to_owned(),
            fields: "*".to_owned(),
            wheres: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
            data: None,
            unscoped: false,
            expansion: None,
            extend_table: None,
            cache_key: None,
        }
    }

    /// Projection list, e.g. `"u.id, u.name"`.
    #[must_use]
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    /// AND a condition fragment with `?` placeholders.
    #[must_use]
    pub fn where_sql<I, V>(mut self, sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(WhereClause {
            joiner: LogicalOp::And,
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// OR a condition fragment with `?` placeholders.
    #[must_use]
    pub fn or_where_sql<I, V>(mut self, sql: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.wheres.push(WhereClause {
            joiner: LogicalOp::Or,
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// AND `column = value`.
    #[must_use]
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.where_sql(format!("{column} = ?"), [value.into()])
    }

    /// AND `column IN (values)`. An empty list matches nothing.
    #[must_use]
    pub fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self.where_sql("1 = 0", Vec::<Value>::new());
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.where_sql(format!("{column} IN ({marks})"), values)
    }

    /// AND a primary key match, qualified by the table alias when present.
    #[must_use]
    pub fn where_pri(self, id: impl Into<Value>) -> Self {
        let column = match self.table_ref() {
            Ok(TableRef {
                alias: Some(alias), ..
            }) => format!("{alias}.{PRIMARY_KEY}"),
            _ => PRIMARY_KEY.to_owned(),
        };
        self.where_eq(&column, id)
    }

    /// Ordering clause, e.g. `"id DESC"`.
    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    /// Maximum number of rows returned.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rows skipped before the first returned row.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Write payload for `update`, `update_extend`, and friends.
    #[must_use]
    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Add one column to a mapping payload, creating it if needed.
    #[must_use]
    pub fn data_kv(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let data = self.data.take().unwrap_or_else(Data::map);
        self.data = Some(data.with(column, value.into()));
        self
    }

    /// Skip automatic soft-field stamping.
    #[must_use]
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    /// Name the extension table without joining it.
    ///
    /// `update_extend` writes to it and a parameterless `expands` joins it.
    #[must_use]
    pub fn extend_table(mut self, table: impl Into<String>) -> Self {
        self.extend_table = Some(table.into());
        self
    }

    /// Serve `all`/`one` from the attached cache under `key`.
    #[must_use]
    pub fn cache(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Model {
    /// The table specification as given.
    #[must_use]
    pub fn table_spec(&self) -> &str {
        &self.tables
    }

    /// The projection list.
    #[must_use]
    pub fn field_list(&self) -> &str {
        &self.fields
    }

    /// The joined extension table, if `expands` was applied.
    #[must_use]
    pub fn expansion(&self) -> Option<&Expansion> {
        self.expansion.as_ref()
    }

    /// The extension table writes go to: the joined one, else the one
    /// named with [`Model::extend_table`].
    #[must_use]
    pub fn extension_table(&self) -> Option<&str> {
        self.expansion
            .as_ref()
            .map(|e| e.table.as_str())
            .or(self.extend_table.as_deref())
    }

    /// The pending write payload.
    #[must_use]
    pub fn payload(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &SqlextConfig {
        &self.config
    }

    /// The base table, with quotes of the executor's dialect stripped.
    pub(crate) fn table_ref(&self) -> SqlextResult<TableRef> {
        TableRef::parse(&self.tables, &self.executor.dialect())
    }
}

// ---------------------------------------------------------------------------
// Condition formatting
// ---------------------------------------------------------------------------

impl Model {
    /// Render the accumulated conditions.
    #[must_use]
    pub fn format_condition(&self) -> FormattedCondition {
        let filter = self.filter();
        let mut extra = String::new();
        if let Some(order) = &self.order_by {
            extra.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(limit) = self.limit {
            extra.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            extra.push_str(&format!(" OFFSET {offset}"));
        }
        match filter {
            Some(f) => FormattedCondition {
                where_clause: format!(" WHERE {}", f.sql),
                extra,
                args: f.args,
            },
            None => FormattedCondition {
                extra,
                ..FormattedCondition::default()
            },
        }
    }

    /// The conditions as a filter, `None` when there are none.
    #[must_use]
    pub fn filter(&self) -> Option<Filter> {
        let wrap = self.wheres.len() > 1;
        let mut sql = String::new();
        let mut args = Vec::new();
        for (i, clause) in self.wheres.iter().enumerate() {
            if clause.sql.trim().is_empty() {
                continue;
            }
            if i > 0 && !sql.is_empty() {
                sql.push_str(match clause.joiner {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                });
            }
            if wrap {
                sql.push_str(&format!("({})", clause.sql.trim()));
            } else {
                sql.push_str(clause.sql.trim());
            }
            args.extend(clause.args.iter().cloned());
        }
        (!sql.is_empty()).then_some(Filter { sql, args })
    }
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

impl Model {
    /// Build the `SELECT` this model would run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty table specification.
    pub fn select_statement(&self) -> SqlextResult<SelectStatement> {
        let table = self.table_ref()?;
        let mut stmt = SelectStatement::new(table.clone());
        stmt.fields.clone_from(&self.fields);
        stmt.filter = self.filter();
        stmt.order_by.clone_from(&self.order_by);
        stmt.limit = self.limit;
        stmt.offset = self.offset;
        if let Some(expansion) = &self.expansion {
            let qualifier = table.qualifier();
            let alias = expansion.alias.as_str();
            stmt.joins.push(Join {
                kind: JoinKind::Left,
                table: TableRef {
                    name: expansion.table.clone(),
                    alias: Some(alias.to_owned()),
                },
                on_left: ColumnRef::qualified(qualifier, PRIMARY_KEY),
                on_right: ColumnRef::qualified(alias, ROW_KEY),
            });
            stmt.group_by = Some(ColumnRef::qualified(qualifier, PRIMARY_KEY));
            stmt.aggregate = Some(JsonAggregate {
                key: ColumnRef::qualified(alias, FIELD_CODE),
                value: ColumnRef::qualified(alias, FIELD_VALUE),
                alias: self.config.ext_data_column.clone(),
            });
        }
        Ok(stmt)
    }

    /// Render the `SELECT` this model would run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty table specification.
    pub fn to_sql(&self) -> SqlextResult<Rendered> {
        Ok(self.select_statement()?.to_sql(&self.executor.dialect()))
    }

    /// Fetch all matching rows.
    ///
    /// On an expanded model the aggregated attribute column is decoded and
    /// its attributes merged into each row; base columns win on collision.
    ///
    /// # Errors
    ///
    /// Returns `Database` errors from the executor and `Decode` errors for a
    /// malformed aggregate column.
    pub fn all(&self) -> SqlextResult<Rows> {
        let stmt = self.select_statement()?;
        if let Some(rows) = self.cached() {
            return Ok(rows);
        }
        let rendered = stmt.to_sql(&self.executor.dialect());
        debug!(sql = %rendered.sql, args = rendered.args.len(), "select");
        let mut rows = self.executor.query(&stmt)?;
        if self.expansion.is_some() {
            let column = self.config.ext_data_column.as_str();
            for row in &mut rows {
                merge_attributes(row, column)?;
            }
        }
        if let (Some(cache), Some(key)) = (&self.cache, &self.cache_key) {
            cache.set(key, &stmt.table.name, rows.clone());
        }
        Ok(rows)
    }

    /// Fetch the first matching row.
    ///
    /// # Errors
    ///
    /// Same as [`Model::all`].
    pub fn one(&self) -> SqlextResult<Option<Record>> {
        Ok(self.clone().limit(1).all()?.into_iter().next())
    }

    /// Count matching rows, or matching entities on an expanded model.
    ///
    /// # Errors
    ///
    /// Returns `Database` errors from the executor.
    pub fn count(&self) -> SqlextResult<u64> {
        let mut stmt = self.select_statement()?;
        stmt.order_by = None;
        stmt.limit = None;
        stmt.offset = None;
        if self.expansion.is_some() {
            stmt.aggregate = None;
            stmt.fields = format!("{}.{PRIMARY_KEY}", stmt.table.qualifier());
            return Ok(self.executor.query(&stmt)?.len() as u64);
        }
        stmt.fields = "COUNT(1) AS total".to_owned();
        let rows = self.executor.query(&stmt)?;
        rows.first()
            .and_then(|r| r.get("total"))
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| SqlextError::database("count query returned no total"))
    }

    fn cached(&self) -> Option<Rows> {
        let (cache, key) = (self.cache.as_ref()?, self.cache_key.as_ref()?);
        let rows = cache.get(key)?;
        debug!(key = %key, "cache hit");
        Some(rows)
    }

    /// Drop cached results of `tables` after a successful write.
    pub(crate) fn invalidate(&self, tables: &[&str]) {
        if let Some(cache) = &self.cache {
            for table in tables {
                cache.invalidate_table(table);
            }
        }
    }
}

/// Decode the aggregate column of `row` and merge its attributes.
fn merge_attributes(row: &mut Record, column: &str) -> SqlextResult<()> {
    let Some(raw) = row.remove(column) else {
        return Ok(());
    };
    let text = match raw {
        Value::Null => return Ok(()),
        Value::String(text) => text,
        other => {
            return Err(SqlextError::decode(format!(
                "aggregated column '{column}' is not JSON text: {other}"
            )));
        }
    };
    let json: JsonValue = serde_json::from_str(&text).map_err(|e| {
        SqlextError::decode(format!("aggregated column '{column}' is malformed: {e}"))
            .with_source(e)
    })?;
    let JsonValue::Object(attributes) = json else {
        return Err(SqlextError::decode(format!(
            "aggregated column '{column}' is not a JSON object"
        )));
    };
    for (name, value) in attributes {
        if name.is_empty() || row.contains_key(&name) {
            continue;
        }
        row.insert(name, Value::from_json(value));
    }
    Ok(())
}
