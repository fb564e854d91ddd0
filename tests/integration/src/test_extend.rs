//! Attribute bag reconciliation tests.

#[cfg(test)]
mod tests {
    use sqlext_core::{ErrorCode, SqlextConfig};
    use sqlext_model::{Data, Value};

    use crate::{Fixture, USER, USER_EXTEND};

    fn payload(name: &str, bag: &str) -> Data {
        Data::map().with("name", name).with("ext_data", bag)
    }

    #[test]
    fn test_should_insert_attribute_when_none_exists() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let out = fx
            .db
            .model("user AS u")
            .extend_table(USER_EXTEND)
            .where_sql("id = ?", [1])
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();

        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.report.matched_entities, 1);
        assert_eq!(out.report.inserted, 1);
        assert_eq!(out.report.updated, 0);
        assert_eq!(
            fx.attributes(),
            vec![(1, "dept".to_owned(), Value::from("eng"))]
        );
        assert_eq!(fx.user(1)["name"], Value::from("A"));
    }

    #[test]
    fn test_should_update_existing_attribute_without_insert() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        fx.seed_attribute(1, "dept", "sales");

        let out = fx
            .db
            .model("user AS u")
            .extend_table(USER_EXTEND)
            .where_sql("id = ?", [1])
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap();

        assert_eq!(out.report.updated, 1);
        assert_eq!(out.report.inserted, 0);
        assert_eq!(
            fx.attributes(),
            vec![(1, "dept".to_owned(), Value::from("eng"))]
        );
        assert!(
            !fx.executor
                .statements()
                .iter()
                .any(|s| s.starts_with("INSERT")),
            "no insert expected"
        );
    }

    #[test]
    fn test_should_insert_only_missing_pairs_across_entities() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob", "Carol"]);
        fx.seed_attribute(1, "dept", "sales");
        fx.seed_attribute(3, "level", "1");

        // N = 2 attributes, E = 3 entities, M = 2 existing pairs.
        let out = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .where_in("u.id", [1, 2, 3])
            .data(payload("X", r#"{"dept":"eng","level":"2"}"#))
            .update_extend()
            .unwrap();

        assert_eq!(out.report.matched_entities, 3);
        assert_eq!(out.report.updated, 2);
        assert_eq!(out.report.inserted, 4);

        let attributes = fx.attributes();
        assert_eq!(attributes.len(), 6);
        assert!(attributes.iter().all(|(_, code, value)| {
            (code == "dept" && *value == Value::from("eng"))
                || (code == "level" && *value == Value::from("2"))
        }));

        let inserts: Vec<String> = fx
            .executor
            .statements()
            .into_iter()
            .filter(|s| s.starts_with("INSERT"))
            .collect();
        assert_eq!(inserts.len(), 1, "staged pairs go in one batch");
        assert!(inserts[0].contains("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn test_should_write_audit_fields() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        fx.db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(
                Data::map()
                    .with("ext_data", r#"{"dept":"eng"}"#)
                    .with("updated_by", 42)
                    .with("updated_name", "root"),
            )
            .update_extend()
            .unwrap();

        let row = &fx.rows(USER_EXTEND)[0];
        assert_eq!(row["created_by"], Value::Int(42));
        assert_eq!(row["updated_name"], Value::from("root"));
        assert!(row["created_time"].as_str().is_some_and(|t| t.len() == 19));
    }

    #[test]
    fn test_should_only_stamp_base_row_for_bag_only_payload() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        assert_eq!(fx.user(1)["updated_at"], Value::Null);

        let out = fx
            .db
            .model("user u")
            .expands()?
            .where_pri(1)
            .data(Data::map().with("ext_data", r#"{"dept":"eng"}"#))
            .update_extend()?;

        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.report.inserted, 1);
        let user = fx.user(1);
        assert_eq!(user["name"], Value::from("Alice"));
        assert!(user["updated_at"].as_str().is_some_and(|t| t.len() == 19));
        assert!(
            fx.executor
                .statements()
                .iter()
                .any(|s| s.starts_with("UPDATE `user` AS u SET `updated_at`=?"))
        );
        Ok(())
    }

    #[test]
    fn test_should_not_duplicate_pair_reported_unchanged() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        fx.seed_attribute(1, "dept", "eng");
        fx.executor.unreport_next_update(USER_EXTEND);

        let out = fx
            .db
            .model("user u")
            .expands()?
            .where_pri(1)
            .data(Data::map().with("ext_data", r#"{"dept":"eng"}"#))
            .update_extend()?;

        // The pair reports zero rows, is staged, and upserts onto itself.
        assert_eq!(out.report.updated, 0);
        assert_eq!(out.report.inserted, 1);
        assert_eq!(
            fx.attributes(),
            vec![(1, "dept".to_owned(), Value::from("eng"))]
        );
        assert_eq!(fx.rows(USER_EXTEND).len(), 1);
        Ok(())
    }

    #[test]
    fn test_should_reject_malformed_bag_before_any_statement() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let err = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload("A", "{not json"))
            .update_extend()
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Decode);
        assert!(fx.executor.statements().is_empty());
        assert_eq!(fx.user(1)["name"], Value::from("Alice"));
    }

    #[test]
    fn test_should_require_where_for_extend() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let err = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend()
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert!(fx.attributes().is_empty());
    }

    #[test]
    fn test_should_roll_back_attributes_when_base_update_fails() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        fx.executor.fail_next_write(USER);

        let result = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend();

        assert_eq!(result.unwrap_err().code, ErrorCode::Database);
        assert!(fx.attributes().is_empty(), "attribute insert rolled back");
        assert_eq!(fx.user(1)["name"], Value::from("Alice"));
        assert_eq!(
            fx.executor.statements().last().map(String::as_str),
            Some("ROLLBACK")
        );
    }

    #[test]
    fn test_should_keep_partial_writes_without_transaction() {
        let config = SqlextConfig::builder().transactional(false).build();
        let fx = Fixture::with_config(config);
        fx.seed_users(&["Alice"]);
        fx.executor.fail_next_write(USER);

        let result = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend();

        assert!(result.is_err());
        assert_eq!(fx.attributes().len(), 1);
        assert!(!fx.executor.statements().iter().any(|s| s == "BEGIN"));
    }

    #[test]
    fn test_should_behave_as_plain_update_without_bag() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let out = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(Data::map().with("name", "B").with("ext_data", ""))
            .update_extend()
            .unwrap();

        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.report, Default::default());
        assert_eq!(fx.user(1)["name"], Value::from("B"));
        assert!(fx.rows(USER).len() == 1 && fx.attributes().is_empty());
    }

    #[test]
    fn test_should_report_output_as_camel_case_json() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let out = fx
            .db
            .model("user u")
            .expands()?
            .where_pri(1)
            .data(payload("A", r#"{"dept":"eng"}"#))
            .update_extend()?;

        let json = serde_json::to_value(out)?;
        assert_eq!(json["rowsAffected"], 1);
        assert_eq!(json["report"]["matchedEntities"], 1);
        assert_eq!(json["report"]["inserted"], 1);
        Ok(())
    }
}
