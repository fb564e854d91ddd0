//! Joining the extension table onto a model's read path.

use sqlext_core::{SqlextError, SqlextResult};
use tracing::debug;

use crate::alias::{resolve_alias, split_spec};
use crate::model::{Expansion, Model};

/// Which extension table to join, and under which alias.
///
/// Unset parts fall back to configuration: the table to
/// `<base table><extend_suffix>` and the alias to `join_alias`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Extension table name.
    pub table: Option<String>,
    /// Join alias.
    pub alias: Option<String>,
}

impl ExpandOptions {
    /// Options with everything defaulted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extension table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the join alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Interpret a single argument: `"ext_user AS e"` names both the table
    /// and the alias, a lone `"e"` names only the alias. Quotes are kept
    /// and stripped once the model's dialect is known.
    #[must_use]
    pub fn infer(spec: &str) -> Self {
        match split_spec(spec) {
            Some((table, Some(alias))) => Self::new().table(table).alias(alias),
            Some((alias, None)) => Self::new().alias(alias),
            None => Self::new(),
        }
    }
}

impl Model {
    /// Join the default extension table. See [`Model::expands_with`].
    ///
    /// # Errors
    ///
    /// Same as [`Model::expands_with`].
    pub fn expands(&self) -> SqlextResult<Self> {
        self.expands_with(ExpandOptions::default())
    }

    /// Derive a model that left-joins an extension table on
    /// `<alias>.id = <join alias>.row_key`, groups by the entity id, and
    /// aggregates the attributes into one JSON column.
    ///
    /// With no table given, a table named earlier through
    /// [`Model::extend_table`] or a previous expansion is reused. A `*`
    /// projection is narrowed to the base table's columns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` when the base table has no alias or the
    /// join alias collides with it.
    pub fn expands_with(&self, options: ExpandOptions) -> SqlextResult<Self> {
        let dialect = self.executor.dialect();
        let binding = resolve_alias(&self.tables, &dialect)?;
        let derived = || self.config.extend_table_for(&binding.table);
        let join_alias = || self.config.join_alias.clone();
        let (table, alias) = match (options.table, options.alias) {
            (Some(table), Some(alias)) => (table, alias),
            (None, Some(alias)) => (derived(), alias),
            (Some(table), None) => (table, join_alias()),
            (None, None) => (
                self.extension_table().map_or_else(derived, ToOwned::to_owned),
                join_alias(),
            ),
        };
        if alias.eq_ignore_ascii_case(&binding.alias) {
            return Err(SqlextError::invalid_parameter(format!(
                "join alias '{alias}' collides with the alias of '{}'",
                self.tables
            )));
        }

        let mut model = self.clone();
        if model.fields.trim() == "*" {
            model.fields = format!("{}.*", binding.alias);
        }
        let table = dialect.trim_quotes(&table).to_owned();
        debug!(base = %binding.table, extension = %table, alias = %alias, "expanding model");
        model.expansion = Some(Expansion { table, alias });
        Ok(model)
    }
}
