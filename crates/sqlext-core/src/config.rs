//! Configuration management for sqlext.
//!
//! All values have defaults matching the conventional `<table>_extend` layout
//! and can be overridden from environment variables via
//! [`SqlextConfig::from_env`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// SQL dialect family used to render statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// MySQL / MariaDB.
    #[default]
    Mysql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl DialectKind {
    /// Returns the lowercase dialect name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = crate::SqlextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(crate::SqlextError::config(format!(
                "unsupported SQL dialect: {other}"
            ))),
        }
    }
}

/// Configuration for models and the extension-table overlay.
///
/// # Examples
///
/// ```
/// use sqlext_core::SqlextConfig;
///
/// let config = SqlextConfig::default();
/// assert_eq!(config.extend_suffix, "_extend");
/// assert_eq!(config.join_alias, "ext");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SqlextConfig {
    /// Dialect used when rendering SQL text.
    #[builder(default)]
    pub dialect: DialectKind,

    /// Suffix appended to a base table name to derive its extension table.
    #[builder(default = String::from("_extend"))]
    pub extend_suffix: String,

    /// Join alias assigned to the extension table when none is given.
    #[builder(default = String::from("ext"))]
    pub join_alias: String,

    /// Result column carrying the aggregated extension attributes.
    #[builder(default = String::from("ext_data"))]
    pub ext_data_column: String,

    /// Candidate names for the soft "updated at" column, in priority order.
    #[builder(default = vec![String::from("updated_at"), String::from("update_at")])]
    pub soft_updated_fields: Vec<String>,

    /// Whether extension reconciliation and the base update share one transaction.
    #[builder(default = true)]
    pub transactional: bool,
}

impl Default for SqlextConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            extend_suffix: String::from("_extend"),
            join_alias: String::from("ext"),
            ext_data_column: String::from("ext_data"),
            soft_updated_fields: vec![String::from("updated_at"), String::from("update_at")],
            transactional: true,
        }
    }
}

impl SqlextConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns an error if `SQLEXT_DIALECT` names an unknown dialect.
    pub fn from_env() -> Result<Self, crate::SqlextError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SQLEXT_DIALECT") {
            config.dialect = v.parse()?;
        }
        if let Ok(v) = std::env::var("SQLEXT_EXTEND_SUFFIX") {
            config.extend_suffix = v;
        }
        if let Ok(v) = std::env::var("SQLEXT_JOIN_ALIAS") {
            config.join_alias = v;
        }
        if let Ok(v) = std::env::var("SQLEXT_EXT_DATA_COLUMN") {
            config.ext_data_column = v;
        }
        if let Ok(v) = std::env::var("SQLEXT_SOFT_UPDATED_FIELDS") {
            config.soft_updated_fields = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Ok(v) = std::env::var("SQLEXT_TRANSACTIONAL") {
            config.transactional = env_flag(&v);
        }

        Ok(config)
    }

    /// Extension table name for a bare base table name.
    #[must_use]
    pub fn extend_table_for(&self, table: &str) -> String {
        format!("{table}{}", self.extend_suffix)
    }
}

fn env_flag(v: &str) -> bool {
    matches!(v, "1" | "true" | "yes" | "TRUE" | "YES")
}
