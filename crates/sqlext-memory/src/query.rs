//! `SELECT` interpretation over in-memory tables.
//!
//! Supports one or more equi-joins, filtering, a single grouping column with
//! a JSON object aggregate, `COUNT(1)`, ordering, and `LIMIT`/`OFFSET`.

use std::cmp::Ordering;
use std::collections::HashMap;

use sqlext_model::{Record, Rows, Value};
use sqlext_orm::condition::{ColumnRef, ConditionError, EvalContext, Scope, parse_condition};
use sqlext_orm::{Dialect, JoinKind, SelectStatement, TableRef};

use crate::state::MemoryState;
use crate::storage::StorageError;

// ---------------------------------------------------------------------------
// Scope over joined rows
// ---------------------------------------------------------------------------

/// One table's row inside a joined tuple; `None` for an unmatched left join.
#[derive(Debug)]
struct Bound<'a> {
    table: &'a TableRef,
    columns: &'a [String],
    row: Option<Record>,
}

impl Bound<'_> {
    fn answers_to(&self, qualifier: &str) -> bool {
        self.table.alias.as_deref() == Some(qualifier) || self.table.name == qualifier
    }

    fn value(&self, name: &str) -> Value {
        self.row
            .as_ref()
            .and_then(|r| r.get(name))
            .cloned()
            .unwrap_or_default()
    }

    fn has(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Resolves columns across the base table and every joined table.
#[derive(Debug)]
pub(crate) struct TupleScope<'a> {
    parts: Vec<Bound<'a>>,
}

impl Scope for TupleScope<'_> {
    fn column(&self, column: &ColumnRef) -> Result<Value, ConditionError> {
        let part = match &column.qualifier {
            Some(q) => self.parts.iter().find(|p| p.answers_to(q)),
            None => self
                .parts
                .iter()
                .find(|p| p.has(&column.name))
                .or_else(|| self.parts.first()),
        };
        part.map(|p| p.value(&column.name))
            .ok_or_else(|| ConditionError::UnknownColumn {
                column: column.to_string(),
            })
    }
}

/// Resolves columns of a single table, accepting its name or alias as
/// qualifier.
#[derive(Debug)]
pub(crate) struct RowScope<'a> {
    pub table: &'a TableRef,
    pub row: &'a Record,
}

impl Scope for RowScope<'_> {
    fn column(&self, column: &ColumnRef) -> Result<Value, ConditionError> {
        if let Some(q) = &column.qualifier {
            if self.table.alias.as_deref() != Some(q.as_str()) && &self.table.name != q {
                return Err(ConditionError::UnknownColumn {
                    column: column.to_string(),
                });
            }
        }
        Ok(self.row.get(&column.name).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Projection {
    All,
    AllOf(String),
    Column { column: ColumnRef, alias: Option<String> },
    Count { alias: String },
}

fn parse_projection(fields: &str, dialect: &Dialect) -> Result<Vec<Projection>, StorageError> {
    fields
        .split(',')
        .map(|item| parse_item(item.trim(), dialect))
        .collect()
}

fn parse_item(item: &str, dialect: &Dialect) -> Result<Projection, StorageError> {
    let tokens: Vec<&str> = item.split_whitespace().collect();
    let (expr, alias) = match tokens.as_slice() {
        [expr] => (*expr, None),
        [expr, kw, alias] if kw.eq_ignore_ascii_case("as") => (*expr, Some((*alias).to_owned())),
        [expr, alias] => (*expr, Some((*alias).to_owned())),
        _ => {
            return Err(StorageError::Unsupported {
                message: format!("projection item '{item}'"),
            });
        }
    };
    let upper = expr.to_ascii_uppercase();
    if upper == "COUNT(1)" || upper == "COUNT(*)" {
        return Ok(Projection::Count {
            alias: alias.unwrap_or_else(|| expr.to_owned()),
        });
    }
    if expr == "*" {
        return Ok(Projection::All);
    }
    if let Some(q) = expr.strip_suffix(".*") {
        return Ok(Projection::AllOf(dialect.trim_quotes(q).to_owned()));
    }
    if expr.contains('(') {
        return Err(StorageError::Unsupported {
            message: format!("projection expression '{expr}'"),
        });
    }
    let column = match expr.split_once('.') {
        Some((q, name)) => ColumnRef::qualified(dialect.trim_quotes(q), dialect.trim_quotes(name)),
        None => ColumnRef::bare(dialect.trim_quotes(expr)),
    };
    Ok(Projection::Column { column, alias })
}

fn project(items: &[Projection], scope: &TupleScope<'_>) -> Result<Record, StorageError> {
    let mut out = Record::new();
    for item in items {
        match item {
            Projection::All => {
                for part in &scope.parts {
                    for c in part.columns {
                        out.entry(c.clone()).or_insert_with(|| part.value(c));
                    }
                }
            }
            Projection::AllOf(q) => {
                let part = scope.parts.iter().find(|p| p.answers_to(q)).ok_or_else(|| {
                    StorageError::Condition(ConditionError::UnknownColumn {
                        column: format!("{q}.*"),
                    })
                })?;
                for c in part.columns {
                    out.insert(c.clone(), part.value(c));
                }
            }
            Projection::Column { column, alias } => {
                let value = scope.column(column)?;
                out.insert(alias.clone().unwrap_or_else(|| column.name.clone()), value);
            }
            Projection::Count { .. } => {}
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run `stmt` against `state`; identifiers are unquoted per `dialect`.
pub(crate) fn run_select(
    state: &MemoryState,
    stmt: &SelectStatement,
    dialect: &Dialect,
) -> Result<Rows, StorageError> {
    let base = state.require_table(&stmt.table.name)?;
    let joined: Vec<_> = stmt
        .joins
        .iter()
        .map(|j| state.require_table(&j.table.name).map(|t| (j, t)))
        .collect::<Result<_, _>>()?;
    let projection = parse_projection(&stmt.fields, dialect)?;
    let filter = stmt.filter.as_ref().map(|f| parse_condition(&f.sql)).transpose()?;
    let args = stmt.filter.as_ref().map_or(&[][..], |f| f.args.as_slice());

    // Build joined tuples.
    let mut tuples: Vec<TupleScope<'_>> = base
        .scan()
        .into_iter()
        .map(|row| TupleScope {
            parts: vec![Bound {
                table: &stmt.table,
                columns: &base.schema().columns,
                row: Some(row),
            }],
        })
        .collect();
    let joined_rows: Vec<Vec<Record>> = joined.iter().map(|(_, t)| t.scan()).collect();
    for ((join, table), rows) in joined.iter().zip(&joined_rows) {
        let mut next = Vec::new();
        for tuple in tuples {
            let left = tuple.column(&join.on_left)?;
            let matches: Vec<&Record> = rows
                .iter()
                .filter(|r| {
                    r.get(&join.on_right.name)
                        .and_then(|v| v.compare(&left))
                        .is_some_and(Ordering::is_eq)
                })
                .collect();
            if matches.is_empty() {
                if join.kind == JoinKind::Left {
                    next.push(extend(&tuple, &join.table, &table.schema().columns, None));
                }
                continue;
            }
            for m in matches {
                next.push(extend(&tuple, &join.table, &table.schema().columns, Some(m.clone())));
            }
        }
        tuples = next;
    }

    // Filter.
    if let Some(expr) = &filter {
        let mut kept = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            let ctx = EvalContext {
                scope: &tuple,
                args,
            };
            if ctx.evaluate(expr)? {
                kept.push(tuple);
            }
        }
        tuples = kept;
    }

    if projection.iter().any(|p| matches!(p, Projection::Count { .. })) && stmt.group_by.is_none() {
        let alias = projection.iter().find_map(|p| match p {
            Projection::Count { alias } => Some(alias.clone()),
            _ => None,
        });
        let total = i64::try_from(tuples.len()).unwrap_or(i64::MAX);
        return Ok(vec![Record::from([(
            alias.unwrap_or_else(|| "count".to_owned()),
            Value::Int(total),
        )])]);
    }

    // Group, project, and aggregate.
    let mut rows = match &stmt.group_by {
        Some(group) => {
            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, Vec<TupleScope<'_>>> = HashMap::new();
            for tuple in tuples {
                let key = format!("{:?}", tuple.column(group)?);
                if !groups.contains_key(&key) {
                    order.push(key.clone());
                }
                groups.entry(key).or_default().push(tuple);
            }
            let mut out = Vec::with_capacity(order.len());
            for key in order {
                let members = groups.remove(&key).unwrap_or_default();
                let Some(first) = members.first() else {
                    continue;
                };
                let mut row = project(&projection, first)?;
                if let Some(agg) = &stmt.aggregate {
                    row.insert(agg.alias.clone(), aggregate(&members, &agg.key, &agg.value)?);
                }
                out.push(row);
            }
            out
        }
        None => {
            let mut out = Vec::with_capacity(tuples.len());
            for tuple in &tuples {
                let mut row = project(&projection, tuple)?;
                if let Some(agg) = &stmt.aggregate {
                    row.insert(
                        agg.alias.clone(),
                        aggregate(std::slice::from_ref(tuple), &agg.key, &agg.value)?,
                    );
                }
                out.push(row);
            }
            out
        }
    };

    if let Some(order) = &stmt.order_by {
        sort_rows(&mut rows, order, dialect);
    }
    let offset = stmt.offset.unwrap_or(0);
    let rows = rows
        .into_iter()
        .skip(offset)
        .take(stmt.limit.unwrap_or(usize::MAX))
        .collect();
    Ok(rows)
}

fn extend<'a>(
    tuple: &TupleScope<'a>,
    table: &'a TableRef,
    columns: &'a [String],
    row: Option<Record>,
) -> TupleScope<'a> {
    let mut parts: Vec<Bound<'a>> = tuple
        .parts
        .iter()
        .map(|p| Bound {
            table: p.table,
            columns: p.columns,
            row: p.row.clone(),
        })
        .collect();
    parts.push(Bound {
        table,
        columns,
        row,
    });
    TupleScope { parts }
}

/// Fold `key`/`value` pairs of a group into JSON object text; `NULL` keys
/// are skipped and a group without pairs yields `NULL`.
fn aggregate(
    members: &[TupleScope<'_>],
    key: &ColumnRef,
    value: &ColumnRef,
) -> Result<Value, StorageError> {
    let mut object = serde_json::Map::new();
    for tuple in members {
        let Some(k) = tuple.column(key)?.to_text() else {
            continue;
        };
        object.insert(k, tuple.column(value)?.to_json());
    }
    if object.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::String(serde_json::Value::Object(object).to_string()))
}

/// Sort by a `col [ASC|DESC], ...` clause; `NULL` sorts first.
fn sort_rows(rows: &mut [Record], clause: &str, dialect: &Dialect) {
    let keys: Vec<(String, bool)> = clause
        .split(',')
        .filter_map(|part| {
            let mut tokens = part.split_whitespace();
            let column = tokens.next()?;
            let column = column.rsplit('.').next().unwrap_or(column);
            let desc = tokens.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
            Some((dialect.trim_quotes(column).to_owned(), desc))
        })
        .collect();
    rows.sort_by(|a, b| {
        for (column, desc) in &keys {
            let (x, y) = (
                a.get(column).cloned().unwrap_or_default(),
                b.get(column).cloned().unwrap_or_default(),
            );
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => x.compare(&y).unwrap_or(Ordering::Equal),
            };
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
