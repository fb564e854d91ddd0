//! Table specification parsing.
//!
//! A table specification is what a caller passes to `Db::model`, e.g.
//! `user`, `user u`, or `` `user` AS u ``. Only the first table of a
//! comma-separated list is considered.

use std::fmt;

use sqlext_core::{SqlextError, SqlextResult};

use crate::dialect::Dialect;

/// A table name with its optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Bare table name with quote characters stripped.
    pub name: String,
    /// Alias, verbatim.
    pub alias: Option<String>,
}

impl TableRef {
    /// A table without alias.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Parse a table specification; the alias is optional. Only `dialect`'s
    /// quote characters are stripped from the table name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty specification.
    pub fn parse(spec: &str, dialect: &Dialect) -> SqlextResult<Self> {
        let Some((table, alias)) = split_spec(spec) else {
            return Err(SqlextError::invalid_parameter(format!(
                "invalid table specification: '{spec}'"
            )));
        };
        Ok(Self {
            name: dialect.trim_quotes(table).to_owned(),
            alias: alias.map(ToOwned::to_owned),
        })
    }

    /// The name columns are qualified with: the alias if any, else the table.
    #[must_use]
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Render as `` `name` AS alias `` (or just the quoted name).
    #[must_use]
    pub fn render(&self, dialect: &Dialect) -> String {
        let name = dialect.quote_identifier(&self.name);
        match &self.alias {
            Some(alias) => format!("{name} AS {alias}"),
            None => name,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {alias}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Split the first table of `spec` into its verbatim name and alias.
pub(crate) fn split_spec(spec: &str) -> Option<(&str, Option<&str>)> {
    let first = spec.split(',').next().unwrap_or_default();
    let tokens: Vec<&str> = first.split_whitespace().collect();
    let table = *tokens.first()?;
    let alias = match tokens.get(1) {
        Some(kw) if kw.eq_ignore_ascii_case("as") => tokens.get(2),
        other => other,
    };
    Some((table, alias.copied()))
}

/// A table that is guaranteed to carry an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasBinding {
    /// Bare table name.
    pub table: String,
    /// Alias used to qualify its columns.
    pub alias: String,
}

/// Resolve the base table and alias a join will be anchored on.
///
/// # Errors
///
/// Returns `InvalidParameter` naming the specification when no alias is
/// present.
pub fn resolve_alias(spec: &str, dialect: &Dialect) -> SqlextResult<AliasBinding> {
    let table = TableRef::parse(spec, dialect)?;
    match table.alias {
        Some(alias) => Ok(AliasBinding {
            table: table.name,
            alias,
        }),
        None => Err(SqlextError::invalid_parameter(format!(
            "table '{spec}' must be written with an alias, e.g. '{} AS t'",
            table.name
        ))),
    }
}
