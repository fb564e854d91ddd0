//! Dialect-specific SQL rendering.

use sqlext_core::DialectKind;

/// Rendering rules for one SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dialect {
    kind: DialectKind,
}

impl Dialect {
    /// Rules for `kind`.
    #[must_use]
    pub const fn new(kind: DialectKind) -> Self {
        Self { kind }
    }

    /// The dialect family.
    #[must_use]
    pub const fn kind(&self) -> DialectKind {
        self.kind
    }

    /// Left and right identifier quote characters.
    #[must_use]
    pub const fn quote_chars(&self) -> (char, char) {
        match self.kind {
            DialectKind::Mysql => ('`', '`'),
            DialectKind::Postgres | DialectKind::Sqlite => ('"', '"'),
        }
    }

    /// Strip this dialect's identifier quote characters from both ends of
    /// `name`. Quotes of other dialects are part of the name.
    #[must_use]
    pub fn trim_quotes<'a>(&self, name: &'a str) -> &'a str {
        let (lq, rq) = self.quote_chars();
        name.trim_start_matches(lq).trim_end_matches(rq)
    }

    /// Quote a plain or dotted identifier.
    ///
    /// Anything that is not a plain word (`*`, expressions, already quoted
    /// names) is returned unchanged.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        let (lq, rq) = self.quote_chars();
        let plain = |part: &str| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !name.split('.').all(plain) {
            return name.to_owned();
        }
        name.split('.')
            .map(|part| format!("{lq}{part}{rq}"))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Aggregate `key`/`value` column pairs of a group into one JSON object.
    ///
    /// Groups that matched no joined row contribute a `NULL` key, which every
    /// supported engine rejects; MySQL and SQLite map it to the empty string
    /// and PostgreSQL filters it out.
    #[must_use]
    pub fn json_object_agg(&self, key: &str, value: &str) -> String {
        match self.kind {
            DialectKind::Mysql => format!("JSON_OBJECTAGG(COALESCE({key}, ''), {value})"),
            DialectKind::Postgres => {
                format!("JSON_OBJECT_AGG({key}, {value}) FILTER (WHERE {key} IS NOT NULL)")
            }
            DialectKind::Sqlite => format!("JSON_GROUP_OBJECT(COALESCE({key}, ''), {value})"),
        }
    }

    /// Rewrite `?` placeholders as `$1, $2, ...` for PostgreSQL.
    ///
    /// Placeholders inside quoted strings and identifiers are left alone.
    #[must_use]
    pub fn number_placeholders(&self, sql: &str) -> String {
        if self.kind != DialectKind::Postgres {
            return sql.to_owned();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut quote: Option<char> = None;
        let mut n = 0;
        for c in sql.chars() {
            match (quote, c) {
                (None, '\'' | '"' | '`') => {
                    quote = Some(c);
                    out.push(c);
                }
                (Some(q), _) if q == c => {
                    quote = None;
                    out.push(c);
                }
                (None, '?') => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            }
        }
        out
    }

    /// Keyword prefix of an insert that skips conflicting rows.
    #[must_use]
    pub const fn insert_ignore_prefix(&self) -> &'static str {
        match self.kind {
            DialectKind::Mysql => "INSERT IGNORE INTO",
            DialectKind::Postgres | DialectKind::Sqlite => "INSERT INTO",
        }
    }

    /// Trailing clause of an insert that skips conflicting rows.
    #[must_use]
    pub const fn insert_ignore_suffix(&self) -> &'static str {
        match self.kind {
            DialectKind::Mysql => "",
            DialectKind::Postgres | DialectKind::Sqlite => " ON CONFLICT DO NOTHING",
        }
    }

    /// Trailing clause of an insert that overwrites `columns` on a conflict
    /// over `keys`.
    #[must_use]
    pub fn upsert_suffix(&self, keys: &[String], columns: &[String]) -> String {
        match self.kind {
            DialectKind::Mysql => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let q = self.quote_identifier(c);
                        format!("{q}=VALUES({q})")
                    })
                    .collect();
                format!(" ON DUPLICATE KEY UPDATE {}", sets.join(","))
            }
            DialectKind::Postgres | DialectKind::Sqlite => {
                let keys: Vec<String> = keys.iter().map(|k| self.quote_identifier(k)).collect();
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let q = self.quote_identifier(c);
                        format!("{q}=EXCLUDED.{q}")
                    })
                    .collect();
                format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    keys.join(","),
                    sets.join(",")
                )
            }
        }
    }
}

impl From<DialectKind> for Dialect {
    fn from(kind: DialectKind) -> Self {
        Self::new(kind)
    }
}
