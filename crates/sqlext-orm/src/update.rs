//! Conditional updates with soft-field stamping.

use sqlext_core::{SqlextError, SqlextResult};
use sqlext_model::{Data, Value};
use tracing::debug;

use crate::executor::ExecResult;
use crate::model::Model;
use crate::statement::{Filter, UpdateStatement};

/// Timestamp format written to soft-update columns and audit fields.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIME_FORMAT`].
#[must_use]
pub fn now_string() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

impl Model {
    /// Update matching rows with the model's payload.
    ///
    /// Unless the model is `unscoped`, the table's soft-update column is
    /// stamped with the current time. Unknown columns are dropped when the
    /// executor reports the table's columns. A successful update drops
    /// cached results of the table.
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` for an empty payload or a missing `WHERE`
    /// condition, and `Database` errors from the executor.
    pub fn update(&self) -> SqlextResult<ExecResult> {
        let stmt = self.prepare_update()?;
        let rendered = stmt.to_sql(&self.executor.dialect());
        debug!(sql = %rendered.sql, args = rendered.args.len(), "update");
        let result = self.executor.update(&stmt)?;
        self.invalidate(&[&stmt.table.name]);
        Ok(result)
    }

    /// Set the payload and update.
    ///
    /// # Errors
    ///
    /// Same as [`Model::update`].
    pub fn update_with(&self, data: impl Into<Data>) -> SqlextResult<ExecResult> {
        self.clone().data(data).update()
    }

    /// Set the payload, AND a condition, and update.
    ///
    /// # Errors
    ///
    /// Same as [`Model::update`].
    pub fn update_where<I, V>(
        &self,
        data: impl Into<Data>,
        sql: impl Into<String>,
        args: I,
    ) -> SqlextResult<ExecResult>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.clone().data(data).where_sql(sql, args).update()
    }

    /// Validate the payload and conditions and build the statement.
    pub(crate) fn prepare_update(&self) -> SqlextResult<UpdateStatement> {
        let data = match &self.data {
            Some(data) if !data.is_empty() => data.clone(),
            _ => return Err(SqlextError::missing_parameter("updating table with empty data")),
        };
        let table = self.table_ref()?;
        let fields = self.executor.table_fields(&table.name)?;

        let mut data = match &fields {
            Some(fields) => retain_known_columns(data, fields),
            None => data,
        };
        if data.is_empty() {
            return Err(SqlextError::missing_parameter(format!(
                "no column of the update data exists in table '{}'",
                table.name
            )));
        }
        if !self.unscoped {
            if let Some(column) = fields
                .as_deref()
                .and_then(|f| self.soft_updated_field(f))
            {
                data = stamp(data, &column, &now_string());
            }
        }

        let condition = self.format_condition();
        if !condition.has_where() {
            return Err(SqlextError::missing_parameter(
                "there should be WHERE condition statement for UPDATE operation",
            ));
        }
        let filter = self.filter().unwrap_or_default();
        Ok(UpdateStatement {
            table,
            data,
            filter: Filter::new(filter.sql, condition.args),
        })
    }

    /// What the base table receives next to an attribute bag: the payload's
    /// own columns, or only the soft-update stamp when none of its keys is a
    /// column. `None` when there is nothing to write.
    pub(crate) fn base_payload(&self, data: Data) -> SqlextResult<Option<Data>> {
        let table = self.table_ref()?;
        let data = match self.executor.table_fields(&table.name)? {
            Some(fields) => retain_known_columns(data, &fields),
            None => data,
        };
        if data.is_empty() {
            return self.soft_stamp_payload();
        }
        Ok(Some(data))
    }

    /// A payload that only stamps the soft-update column with the current
    /// time; `None` when unscoped or when the table has no such column.
    fn soft_stamp_payload(&self) -> SqlextResult<Option<Data>> {
        if self.unscoped {
            return Ok(None);
        }
        let table = self.table_ref()?;
        let Some(fields) = self.executor.table_fields(&table.name)? else {
            return Ok(None);
        };
        Ok(self
            .soft_updated_field(&fields)
            .map(|column| Data::map().with(column, now_string())))
    }

    /// The first configured soft-update column the table has, as the table
    /// spells it.
    fn soft_updated_field(&self, fields: &[String]) -> Option<String> {
        self.config.soft_updated_fields.iter().find_map(|candidate| {
            fields
                .iter()
                .find(|f| f.eq_ignore_ascii_case(candidate))
                .cloned()
        })
    }
}

/// Drop mapping keys that are not columns of the table.
fn retain_known_columns(data: Data, fields: &[String]) -> Data {
    match data {
        Data::Map(mut map) => {
            map.retain(|key, _| fields.iter().any(|f| f.eq_ignore_ascii_case(key)));
            Data::Map(map)
        }
        raw @ Data::Raw(_) => raw,
    }
}

/// Write `now` to `column`. A mapping's own value for the column is
/// replaced; raw assignments that already set it are left alone.
fn stamp(data: Data, column: &str, now: &str) -> Data {
    match data {
        Data::Map(mut map) => {
            map.retain(|k, _| !k.eq_ignore_ascii_case(column));
            map.insert(column.to_owned(), Value::from(now).into());
            Data::Map(map)
        }
        Data::Raw(raw) => {
            if raw.to_ascii_lowercase().contains(&column.to_ascii_lowercase()) {
                Data::Raw(raw)
            } else {
                Data::Raw(format!("{raw},{column}='{now}'"))
            }
        }
    }
}
