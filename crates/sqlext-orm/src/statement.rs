//! Structured statements handed to an [`Executor`](crate::Executor).
//!
//! Statements keep their parts separate so an executor can either render
//! them to SQL text with [`SelectStatement::to_sql`] and friends, or
//! interpret them directly.

use std::collections::BTreeSet;

use sqlext_model::{Data, DataValue, Record, Value};

use crate::alias::TableRef;
use crate::condition::ColumnRef;
use crate::dialect::Dialect;

/// SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rendered {
    /// Statement text.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    pub args: Vec<Value>,
}

/// A condition fragment (without the `WHERE` keyword) and its arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    /// Condition text using `?` placeholders.
    pub sql: String,
    /// Placeholder values.
    pub args: Vec<Value>,
}

impl Filter {
    /// A filter over `sql` with `args`.
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `LEFT JOIN`
    Left,
    /// `INNER JOIN`
    Inner,
}

/// `<kind> JOIN table ON on_left = on_right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Join flavor.
    pub kind: JoinKind,
    /// Joined table.
    pub table: TableRef,
    /// Column on the already-selected side.
    pub on_left: ColumnRef,
    /// Column on the joined table.
    pub on_right: ColumnRef,
}

/// Aggregate of `key`/`value` pairs into a JSON object column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonAggregate {
    /// Column supplying object keys.
    pub key: ColumnRef,
    /// Column supplying object values.
    pub value: ColumnRef,
    /// Output column name.
    pub alias: String,
}

/// A `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Primary table.
    pub table: TableRef,
    /// Projection list, e.g. `*`, `u.*`, `u.id, u.name`.
    pub fields: String,
    /// Aggregate column appended to the projection.
    pub aggregate: Option<JsonAggregate>,
    /// Joined tables, in order.
    pub joins: Vec<Join>,
    /// Row filter.
    pub filter: Option<Filter>,
    /// Grouping column.
    pub group_by: Option<ColumnRef>,
    /// Ordering clause, e.g. `id DESC`.
    pub order_by: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Rows skipped before the first returned row.
    pub offset: Option<usize>,
}

impl SelectStatement {
    /// `SELECT * FROM table`.
    #[must_use]
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            fields: "*".to_owned(),
            aggregate: None,
            joins: Vec::new(),
            filter: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Render the statement for `dialect`.
    #[must_use]
    pub fn to_sql(&self, dialect: &Dialect) -> Rendered {
        let mut sql = format!("SELECT {}", self.fields);
        if let Some(agg) = &self.aggregate {
            sql.push_str(&format!(
                ", {} AS {}",
                dialect.json_object_agg(&agg.key.to_string(), &agg.value.to_string()),
                agg.alias
            ));
        }
        sql.push_str(&format!(" FROM {}", self.table.render(dialect)));
        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Left => "LEFT JOIN",
                JoinKind::Inner => "INNER JOIN",
            };
            sql.push_str(&format!(
                " {kind} {} ON {} = {}",
                join.table.render(dialect),
                join.on_left,
                join.on_right
            ));
        }
        let mut args = Vec::new();
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            args.extend(filter.args.iter().cloned());
        }
        if let Some(group) = &self.group_by {
            sql.push_str(&format!(" GROUP BY {group}"));
        }
        if let Some(order) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {order}"));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Rendered {
            sql: dialect.number_placeholders(&sql),
            args,
        }
    }
}

/// An `UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    /// Target table.
    pub table: TableRef,
    /// Column mapping or raw assignment list.
    pub data: Data,
    /// Row filter.
    pub filter: Filter,
}

impl UpdateStatement {
    /// Render the statement for `dialect`.
    ///
    /// Plain values bind as placeholders; counters render as
    /// `col = field + ?`. Raw payloads are emitted verbatim.
    #[must_use]
    pub fn to_sql(&self, dialect: &Dialect) -> Rendered {
        let mut args = Vec::new();
        let set = match &self.data {
            Data::Map(map) => map
                .iter()
                .map(|(column, value)| {
                    let q = dialect.quote_identifier(column);
                    match value {
                        DataValue::Set(v) => {
                            args.push(v.clone());
                            format!("{q}=?")
                        }
                        DataValue::Counter(c) => {
                            args.push(c.delta());
                            format!("{q}={}+?", dialect.quote_identifier(&c.field))
                        }
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Data::Raw(raw) => raw.clone(),
        };
        args.extend(self.filter.args.iter().cloned());
        let sql = format!(
            "UPDATE {} SET {set} WHERE {}",
            self.table.render(dialect),
            self.filter.sql
        );
        Rendered {
            sql: dialect.number_placeholders(&sql),
            args,
        }
    }
}

/// What an insert does when a row collides with a unique key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Fail the statement.
    #[default]
    Error,
    /// Skip the colliding row.
    Ignore,
    /// Overwrite `columns` of the existing row matched on `keys`.
    Update {
        /// Unique key columns.
        keys: Vec<String>,
        /// Columns copied from the new row.
        columns: Vec<String>,
    },
}

/// A multi-row `INSERT`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table.
    pub table: TableRef,
    /// Rows to insert.
    pub rows: Vec<Record>,
    /// Conflict handling.
    pub on_conflict: OnConflict,
}

impl InsertStatement {
    /// The union of all row columns, sorted.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Render the statement for `dialect`. Columns a row lacks bind `NULL`.
    #[must_use]
    pub fn to_sql(&self, dialect: &Dialect) -> Rendered {
        let columns = self.columns();
        let mut args = Vec::with_capacity(columns.len() * self.rows.len());
        let tuple = format!("({})", vec!["?"; columns.len()].join(","));
        let mut values = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            args.extend(columns.iter().map(|c| row.get(c).cloned().unwrap_or_default()));
            values.push(tuple.clone());
        }
        let (prefix, suffix) = match &self.on_conflict {
            OnConflict::Error => ("INSERT INTO", String::new()),
            OnConflict::Ignore => (
                dialect.insert_ignore_prefix(),
                dialect.insert_ignore_suffix().to_owned(),
            ),
            OnConflict::Update { keys, columns } => {
                ("INSERT INTO", dialect.upsert_suffix(keys, columns))
            }
        };
        let quoted: Vec<String> = columns.iter().map(|c| dialect.quote_identifier(c)).collect();
        let sql = format!(
            "{prefix} {}({}) VALUES {}{suffix}",
            dialect.quote_identifier(&self.table.name),
            quoted.join(","),
            values.join(",")
        );
        Rendered {
            sql: dialect.number_placeholders(&sql),
            args,
        }
    }
}
