//! Extension table rows.
//!
//! An extension table stores one row per (entity, attribute) pair:
//!
//! ```text
//! row_key | field_code | field_value | created_* | updated_*
//! ```
//!
//! `(row_key, field_code)` is unique.

use serde::{Deserialize, Serialize};

use crate::data::Data;
use crate::value::{Record, Value};

/// Column holding the owning entity id.
pub const ROW_KEY: &str = "row_key";
/// Column holding the attribute name.
pub const FIELD_CODE: &str = "field_code";
/// Column holding the attribute value.
pub const FIELD_VALUE: &str = "field_value";
/// Audit columns written on insert.
pub const CREATED_BY: &str = "created_by";
/// Audit columns written on insert.
pub const CREATED_NAME: &str = "created_name";
/// Audit columns written on insert.
pub const CREATED_TIME: &str = "created_time";
/// Audit columns written on every write.
pub const UPDATED_BY: &str = "updated_by";
/// Audit columns written on every write.
pub const UPDATED_NAME: &str = "updated_name";
/// Audit columns written on every write.
pub const UPDATED_TIME: &str = "updated_time";

/// All extension table columns.
pub const COLUMNS: [&str; 9] = [
    ROW_KEY,
    FIELD_CODE,
    FIELD_VALUE,
    CREATED_BY,
    CREATED_NAME,
    CREATED_TIME,
    UPDATED_BY,
    UPDATED_NAME,
    UPDATED_TIME,
];

/// Who performed a write and when.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditFields {
    /// Actor id, taken from the payload's `updated_by`.
    pub by: Value,
    /// Actor display name, taken from the payload's `updated_name`.
    pub name: Value,
    /// Write timestamp.
    pub time: String,
}

impl AuditFields {
    /// Read the actor from a write payload; missing fields become `Null`.
    #[must_use]
    pub fn from_payload(data: &Data, time: impl Into<String>) -> Self {
        Self {
            by: data.value(UPDATED_BY).cloned().unwrap_or_default(),
            name: data.value(UPDATED_NAME).cloned().unwrap_or_default(),
            time: time.into(),
        }
    }
}

/// One dynamic attribute of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRow {
    /// Owning entity id.
    pub row_key: i64,
    /// Attribute name.
    pub field_code: String,
    /// Attribute value.
    pub field_value: Value,
    /// Creator id.
    pub created_by: Value,
    /// Creator name.
    pub created_name: Value,
    /// Creation time.
    pub created_time: Value,
    /// Last updater id.
    pub updated_by: Value,
    /// Last updater name.
    pub updated_name: Value,
    /// Last update time.
    pub updated_time: Value,
}

impl ExtensionRow {
    /// A new row stamped as both created and updated by `audit`.
    #[must_use]
    pub fn new(
        row_key: i64,
        field_code: impl Into<String>,
        field_value: Value,
        audit: &AuditFields,
    ) -> Self {
        let time = Value::String(audit.time.clone());
        Self {
            row_key,
            field_code: field_code.into(),
            field_value,
            created_by: audit.by.clone(),
            created_name: audit.name.clone(),
            created_time: time.clone(),
            updated_by: audit.by.clone(),
            updated_name: audit.name.clone(),
            updated_time: time,
        }
    }

    /// Columns written when an existing row is updated.
    #[must_use]
    pub fn update_record(field_value: Value, audit: &AuditFields) -> Record {
        Record::from([
            (FIELD_VALUE.to_owned(), field_value),
            (UPDATED_BY.to_owned(), audit.by.clone()),
            (UPDATED_NAME.to_owned(), audit.name.clone()),
            (UPDATED_TIME.to_owned(), Value::String(audit.time.clone())),
        ])
    }

    /// Full column set for an insert.
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::from([
            (ROW_KEY.to_owned(), Value::Int(self.row_key)),
            (FIELD_CODE.to_owned(), Value::String(self.field_code.clone())),
            (FIELD_VALUE.to_owned(), self.field_value.clone()),
            (CREATED_BY.to_owned(), self.created_by.clone()),
            (CREATED_NAME.to_owned(), self.created_name.clone()),
            (CREATED_TIME.to_owned(), self.created_time.clone()),
            (UPDATED_BY.to_owned(), self.updated_by.clone()),
            (UPDATED_NAME.to_owned(), self.updated_name.clone()),
            (UPDATED_TIME.to_owned(), self.updated_time.clone()),
        ])
    }

    /// Parse a result row of the extension table.
    ///
    /// Returns `None` when `row_key` or `field_code` is missing.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let get = |k: &str| record.get(k).cloned().unwrap_or_default();
        Some(Self {
            row_key: record.get(ROW_KEY)?.as_i64()?,
            field_code: record.get(FIELD_CODE)?.to_text()?,
            field_value: get(FIELD_VALUE),
            created_by: get(CREATED_BY),
            created_name: get(CREATED_NAME),
            created_time: get(CREATED_TIME),
            updated_by: get(UPDATED_BY),
            updated_name: get(UPDATED_NAME),
            updated_time: get(UPDATED_TIME),
        })
    }
}
