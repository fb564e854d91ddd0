//! Base table update tests.

#[cfg(test)]
mod tests {
    use sqlext_core::{DialectKind, ErrorCode, SqlextConfig};
    use sqlext_model::{Data, Value};

    use crate::Fixture;

    #[test]
    fn test_should_stamp_soft_updated_column() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let result = fx
            .db
            .model("user u")
            .where_pri(1)
            .data(Data::map().with("name", "B"))
            .update()?;

        assert_eq!(result.rows_affected, 1);
        let user = fx.user(1);
        assert_eq!(user["name"], Value::from("B"));
        assert!(user["updated_at"].as_str().is_some_and(|t| t.len() == 19));
        Ok(())
    }

    #[test]
    fn test_should_overwrite_caller_supplied_update_time() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        fx.db.model("user u").where_pri(1).update_with(
            Data::map()
                .with("name", "B")
                .with("updated_at", "2000-01-01 00:00:00"),
        )?;

        let stamped = fx.user(1)["updated_at"].clone();
        assert_ne!(stamped, Value::from("2000-01-01 00:00:00"));
        assert!(stamped.as_str().is_some_and(|t| t.len() == 19));
        Ok(())
    }

    #[test]
    fn test_should_not_stamp_unscoped_update() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        fx.db
            .model("user u")
            .unscoped()
            .where_pri(1)
            .data(Data::map().with("name", "B"))
            .update()
            .unwrap();

        assert_eq!(fx.user(1)["updated_at"], Value::Null);
    }

    #[test]
    fn test_should_reject_empty_payload_even_with_where() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let err = fx
            .db
            .model("user u")
            .where_pri(1)
            .data(Data::map())
            .update()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);

        let err = fx.db.model("user u").where_pri(1).update().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert!(fx.executor.statements().is_empty());
    }

    #[test]
    fn test_should_reject_update_without_where() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob"]);

        let err = fx
            .db
            .model("user u")
            .data(Data::map().with("name", "B"))
            .update()
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert_eq!(fx.user(2)["name"], Value::from("Bob"));
    }

    #[test]
    fn test_should_drop_columns_the_table_lacks() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        fx.db
            .model("user u")
            .where_pri(1)
            .data(Data::map().with("name", "B").with("nickname", "bee"))
            .update()
            .unwrap();

        assert_eq!(fx.user(1)["name"], Value::from("B"));
        assert!(!fx.user(1).contains_key("nickname"));
    }

    #[test]
    fn test_should_apply_raw_assignments_with_condition() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob"]);

        let result = fx
            .db
            .model("user u")
            .update_where("score = score + 5", "u.name = ?", ["Bob"])
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(fx.user(2)["score"], Value::Int(15));
        assert_eq!(fx.user(1)["score"], Value::Int(10));
    }

    #[test]
    fn test_should_render_postgres_placeholders() {
        let config = SqlextConfig::builder()
            .dialect(DialectKind::Postgres)
            .build();
        let fx = Fixture::with_config(config);
        fx.seed_users(&["Alice"]);

        fx.db
            .model("user u")
            .unscoped()
            .where_pri(1)
            .data(Data::map().with("name", "B"))
            .update()
            .unwrap();

        assert_eq!(
            fx.executor.statements(),
            vec![r#"UPDATE "user" AS u SET "name"=$1 WHERE u.id = $2"#.to_owned()]
        );
    }

    #[test]
    fn test_should_unquote_table_with_dialect_quotes_only() -> anyhow::Result<()> {
        let config = SqlextConfig::builder()
            .dialect(DialectKind::Postgres)
            .build();
        let fx = Fixture::with_config(config);
        fx.seed_users(&["Alice"]);

        let result = fx
            .db
            .model(r#""user" u"#)
            .where_pri(1)
            .update_with(Data::map().with("name", "B"))?;
        assert_eq!(result.rows_affected, 1);
        assert_eq!(fx.user(1)["name"], Value::from("B"));

        let err = fx
            .db
            .model("`user` u")
            .where_pri(1)
            .update_with(Data::map().with("name", "C"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Database);
        assert_eq!(fx.user(1)["name"], Value::from("B"));
        Ok(())
    }
}
