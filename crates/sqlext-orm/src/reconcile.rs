//! Writing attribute bags to the extension table alongside a base update.
//!
//! For every entity the base update targets, each attribute of the bag is
//! first updated in place; pairs that matched no row are collected and
//! inserted in one batch. The batch upserts on `(row_key, field_code)` so a
//! pair that an engine reports as unchanged (zero affected rows) is not
//! duplicated.

use serde::Serialize;
use sqlext_core::{SqlextError, SqlextResult};
use sqlext_model::extension::{
    FIELD_CODE, FIELD_VALUE, ROW_KEY, UPDATED_BY, UPDATED_NAME, UPDATED_TIME,
};
use sqlext_model::{AttributeBag, AuditFields, Data, ExtensionRow, Value, strip_bag_keys};
use tracing::{debug, info, warn};

use crate::alias::TableRef;
use crate::dialect::Dialect;
use crate::model::{Model, PRIMARY_KEY};
use crate::statement::{Filter, InsertStatement, OnConflict, SelectStatement, UpdateStatement};
use crate::update::now_string;

/// What reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Entities the condition matched.
    pub matched_entities: usize,
    /// Attribute rows updated in place.
    pub updated: usize,
    /// Attribute rows inserted.
    pub inserted: usize,
}

/// Result of [`Model::update_extend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendOutput {
    /// Rows the base update matched.
    pub rows_affected: u64,
    /// Extension table work.
    pub report: ReconcileReport,
}

impl Model {
    /// Update the base table and write the payload's attribute bag to the
    /// extension table.
    ///
    /// Without an extension table, or with an empty bag, this is a plain
    /// [`Model::update`]. Bag keys never reach the base table. When no other
    /// key of the payload is a base column, the base update only stamps the
    /// soft-update column, and is skipped for tables without one. With
    /// `transactional` configured, the extension writes and the base update
    /// commit or roll back together.
    ///
    /// # Errors
    ///
    /// Returns `Decode` for a malformed bag, `MissingParameter` for a missing
    /// payload or `WHERE` condition, and `Database` errors from any write.
    pub fn update_extend(&self) -> SqlextResult<ExtendOutput> {
        let dialect = self.executor.dialect();
        let Some(ext_table) = self
            .extension_table()
            .map(|t| bare_table(t, &dialect).to_owned())
        else {
            return self.update_plain();
        };
        let Some(data) = self.data.clone() else {
            return self.update_plain();
        };
        let bag = AttributeBag::from_payload(&data)?;
        if bag.is_empty() {
            return self.clone().data(strip_bag_keys(data)).update_plain();
        }
        if !self.format_condition().has_where() {
            return Err(SqlextError::missing_parameter(
                "there should be WHERE condition statement for UPDATE operation",
            ));
        }

        let audit = AuditFields::from_payload(&data, now_string());
        let base = self
            .base_payload(strip_bag_keys(data))?
            .map(|d| self.clone().data(d));

        let mut output = ExtendOutput::default();
        let mut body = || -> SqlextResult<()> {
            output.report = self.reconcile(&ext_table, &bag, &audit)?;
            if let Some(base) = &base {
                output.rows_affected = base.update()?.rows_affected;
            }
            Ok(())
        };
        if self.config.transactional {
            self.executor.transaction(&mut body)?;
        } else {
            body()?;
        }

        let table = self.table_ref()?;
        self.invalidate(&[&table.name, &ext_table]);
        Ok(output)
    }

    fn update_plain(&self) -> SqlextResult<ExtendOutput> {
        let result = self.update()?;
        Ok(ExtendOutput {
            rows_affected: result.rows_affected,
            report: ReconcileReport::default(),
        })
    }

    /// Write `bag` for every entity matched by the model's conditions.
    fn reconcile(
        &self,
        ext_table: &str,
        bag: &AttributeBag,
        audit: &AuditFields,
    ) -> SqlextResult<ReconcileReport> {
        let ids = self.matched_ids()?;
        let mut report = ReconcileReport {
            matched_entities: ids.len(),
            ..ReconcileReport::default()
        };
        let table = TableRef::bare(ext_table);
        let mut staged = Vec::new();

        for id in &ids {
            for (code, value) in bag {
                let stmt = UpdateStatement {
                    table: table.clone(),
                    data: Data::from(ExtensionRow::update_record(value.clone(), audit)),
                    filter: Filter::new(
                        format!("{ROW_KEY} = ? AND {FIELD_CODE} = ?"),
                        vec![Value::Int(*id), Value::from(code.as_str())],
                    ),
                };
                let affected = self.executor.update(&stmt)?.rows_affected;
                if affected == 0 {
                    staged.push(ExtensionRow::new(*id, code.as_str(), value.clone(), audit));
                } else {
                    report.updated += 1;
                }
            }
        }

        if !staged.is_empty() {
            let stmt = InsertStatement {
                table: table.clone(),
                rows: staged.iter().map(ExtensionRow::to_record).collect(),
                on_conflict: OnConflict::Update {
                    keys: vec![ROW_KEY.to_owned(), FIELD_CODE.to_owned()],
                    columns: [FIELD_VALUE, UPDATED_BY, UPDATED_NAME, UPDATED_TIME]
                        .map(str::to_owned)
                        .to_vec(),
                },
            };
            let rendered = stmt.to_sql(&self.executor.dialect());
            debug!(sql = %rendered.sql, rows = staged.len(), "insert extension rows");
            self.executor.insert(&stmt)?;
            report.inserted = staged.len();
        }

        info!(
            table = %ext_table,
            matched = report.matched_entities,
            updated = report.updated,
            inserted = report.inserted,
            "reconciled extension attributes"
        );
        Ok(report)
    }

    /// Ids of the base rows the model's conditions match.
    fn matched_ids(&self) -> SqlextResult<Vec<i64>> {
        let table = self.table_ref()?;
        let mut stmt = SelectStatement::new(table.clone());
        stmt.fields = format!("{}.{PRIMARY_KEY}", table.qualifier());
        stmt.filter = self.filter();
        let rendered = stmt.to_sql(&self.executor.dialect());
        debug!(sql = %rendered.sql, "select matched ids");
        let rows = self.executor.query(&stmt)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            match row.get(PRIMARY_KEY).and_then(Value::as_i64) {
                Some(id) => ids.push(id),
                None => warn!(table = %table.name, "matched row without integer id skipped"),
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

/// Table name of a specification that may carry an alias or quotes.
fn bare_table<'a>(spec: &'a str, dialect: &Dialect) -> &'a str {
    dialect.trim_quotes(spec.split_whitespace().next().unwrap_or(spec))
}

#[cfg(test)]
mod tests {
    use sqlext_core::ErrorCode;

    use super::*;
    use crate::testing::{FakeExecutor, shared_db};

    fn payload(bag: &str) -> Data {
        Data::map().with("name", "A").with("ext_data", bag)
    }

    #[test]
    fn test_should_insert_missing_pairs_in_one_batch() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1, 2]);
        exec.existing.lock().insert((1, "dept".to_owned()));
        let (db, exec) = shared_db(exec);

        let out = db
            .model("user u")
            .expands()
            .unwrap()
            .where_in("u.id", [1, 2])
            .data(payload(r#"{"dept":"eng","level":"3"}"#))
            .update_extend()
            .unwrap();

        assert_eq!(out.report.matched_entities, 2);
        assert_eq!(out.report.updated, 1);
        assert_eq!(out.report.inserted, 3);
        assert_eq!(out.rows_affected, 2);

        let inserts = exec.inserts.lock();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].rows.len(), 3);
        assert_eq!(inserts[0].table.name, "user_extend");
        assert_eq!(*exec.transactions.lock(), 1);
    }

    #[test]
    fn test_should_keep_bag_out_of_base_update() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        db.model("user u")
            .extend_table("user_extend")
            .where_pri(1)
            .data(payload(r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();
        let updates = exec.updates.lock();
        let base = updates.iter().find(|u| u.table.name == "user").unwrap();
        assert!(base.data.as_map().unwrap().get("ext_data").is_none());
    }

    #[test]
    fn test_should_delegate_without_extension_table() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        let out = db
            .model("user")
            .where_pri(1)
            .data(Data::map().with("name", "A"))
            .update_extend()
            .unwrap();
        assert_eq!(out.report, ReconcileReport::default());
        assert_eq!(out.rows_affected, 1);
        assert!(exec.inserts.lock().is_empty());
    }

    #[test]
    fn test_should_fail_on_malformed_bag_before_writing() {
        let exec = FakeExecutor::default().with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        let err = db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload("{broken"))
            .update_extend()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Decode);
        assert!(exec.updates.lock().is_empty());
    }

    #[test]
    fn test_should_require_where_before_reconciling() {
        let exec = FakeExecutor::default().with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        let err = db
            .model("user u")
            .expands()
            .unwrap()
            .data(payload(r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert!(exec.log.lock().is_empty());
    }

    #[test]
    fn test_should_propagate_attribute_write_failure() {
        let mut exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1]);
        exec.fail_table = Some("user_extend".to_owned());
        let (db, exec) = shared_db(exec);
        let err = db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload(r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Database);
        assert!(exec.updates.lock().iter().all(|u| u.table.name != "user"));
    }

    #[test]
    fn test_should_stamp_base_row_for_bag_only_payload() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name", "updated_at"])
            .with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        let out = db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(Data::map().with("extData", r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();
        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.report.inserted, 1);
        let updates = exec.updates.lock();
        let base = updates.iter().find(|u| u.table.name == "user").unwrap();
        let map = base.data.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), ["updated_at"]);
    }

    #[test]
    fn test_should_write_only_extension_without_soft_column() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        let out = db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(Data::map().with("extData", r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();
        assert_eq!(out.rows_affected, 0);
        assert_eq!(out.report.inserted, 1);
        assert!(exec.updates.lock().iter().all(|u| u.table.name == "user_extend"));
    }

    #[test]
    fn test_should_upsert_pairs_reported_unchanged() {
        // `existing` is empty, so every in-place update reports zero rows
        // the way an engine does for an unchanged value.
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[1]);
        let (db, exec) = shared_db(exec);
        db.model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload(r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();
        let inserts = exec.inserts.lock();
        match &inserts[0].on_conflict {
            OnConflict::Update { keys, columns } => {
                assert_eq!(keys, &[ROW_KEY, FIELD_CODE]);
                assert!(columns.iter().any(|c| c == FIELD_VALUE));
            }
            other => panic!("expected an upsert, got {other:?}"),
        }
        assert!(exec.log.lock().iter().any(|sql| sql.contains("ON DUPLICATE KEY UPDATE")));
    }

    #[test]
    fn test_should_remove_repeated_ids() {
        let exec = FakeExecutor::default()
            .with_fields("user", &["id", "name"])
            .with_ids(&[2, 1, 2]);
        let (db, exec) = shared_db(exec);
        let out = db
            .model("user u")
            .expands()
            .unwrap()
            .where_in("u.id", [1, 2])
            .data(payload(r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();
        assert_eq!(out.report.matched_entities, 2);
        assert_eq!(out.report.inserted, 2);
        let inserts = exec.inserts.lock();
        let keys: Vec<_> = inserts[0]
            .rows
            .iter()
            .map(|r| r[ROW_KEY].as_i64().unwrap())
            .collect();
        assert_eq!(keys, [1, 2]);
    }

    #[test]
    fn test_should_strip_alias_from_extension_table() {
        let mysql = Dialect::default();
        assert_eq!(bare_table("`user_extend` ext", &mysql), "user_extend");
        assert_eq!(bare_table("attrs", &mysql), "attrs");
    }
}
