//! Expanded read path and alias tests.

#[cfg(test)]
mod tests {
    use sqlext_core::ErrorCode;
    use sqlext_model::{Data, Value};
    use sqlext_orm::{Executor, ExpandOptions, resolve_alias};

    use crate::{Fixture, USER, USER_EXTEND};

    #[test]
    fn test_should_resolve_aliases() {
        let fx = Fixture::new();
        let dialect = fx.executor.dialect();
        let binding = resolve_alias("`user` AS u", &dialect).unwrap();
        assert_eq!((binding.table.as_str(), binding.alias.as_str()), ("user", "u"));
        let binding = resolve_alias("user u", &dialect).unwrap();
        assert_eq!((binding.table.as_str(), binding.alias.as_str()), ("user", "u"));
        assert_eq!(
            resolve_alias("user", &dialect).unwrap_err().code,
            ErrorCode::InvalidParameter
        );
    }

    #[test]
    fn test_should_render_default_expansion() {
        let fx = Fixture::new();
        let sql = fx
            .db
            .model("user AS u")
            .expands()
            .unwrap()
            .to_sql()
            .unwrap()
            .sql;

        assert!(sql.contains("LEFT JOIN `user_extend` AS ext ON u.id = ext.row_key"), "{sql}");
        assert!(sql.contains("GROUP BY u.id"), "{sql}");
        assert!(sql.contains("u.*"), "{sql}");
        assert!(sql.contains("AS ext_data"), "{sql}");
    }

    #[test]
    fn test_should_reject_expansion_without_alias() {
        let fx = Fixture::new();
        let err = fx.db.model(USER).expands().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }

    #[test]
    fn test_should_merge_attributes_into_rows() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob"]);
        fx.seed_attribute(1, "dept", "eng");
        fx.seed_attribute(1, "level", "3");
        fx.seed_attribute(1, "name", "shadowed");

        let rows = fx
            .db
            .model("user u")
            .expands()
            .unwrap()
            .order_by("u.id")
            .all()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["dept"], Value::from("eng"));
        assert_eq!(rows[0]["level"], Value::from("3"));
        assert_eq!(rows[0]["name"], Value::from("Alice"), "base columns win");
        assert!(!rows[1].contains_key("dept"));
    }

    #[test]
    fn test_should_count_entities_not_attribute_rows() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob"]);
        fx.seed_attribute(1, "dept", "eng");
        fx.seed_attribute(1, "level", "3");

        let model = fx.db.model("user u").expands().unwrap();
        assert_eq!(model.count().unwrap(), 2);
        assert_eq!(fx.db.model("user u").count().unwrap(), 2);
    }

    #[test]
    fn test_should_use_custom_table_and_alias() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        fx.seed_attribute(1, "dept", "eng");

        let model = fx
            .db
            .model("user u")
            .expands_with(ExpandOptions::infer("user_extend AS x"))
            .unwrap();
        let sql = model.to_sql().unwrap().sql;
        assert!(sql.contains("`user_extend` AS x ON u.id = x.row_key"), "{sql}");

        let row = model.where_sql("x.field_code = ?", ["dept"]).one().unwrap();
        assert_eq!(row.map(|r| r["dept"].clone()), Some(Value::from("eng")));
    }

    #[test]
    fn test_should_serve_cached_rows_until_write() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);
        let read = || {
            fx.db
                .model("user u")
                .expands()
                .unwrap()
                .cache("users")
                .all()
                .unwrap()
        };

        assert!(!read()[0].contains_key("dept"));
        fx.seed_attribute(1, "dept", "eng");
        assert!(!read()[0].contains_key("dept"), "stale read served from cache");
        assert_eq!(fx.cache.stats(), (1, 1));

        fx.db
            .model("user u")
            .expands()
            .unwrap()
            .where_pri(1)
            .data(Data::map().with("ext_data", r#"{"level":"1"}"#))
            .update_extend()
            .unwrap();

        let rows = read();
        assert_eq!(rows[0]["dept"], Value::from("eng"));
        assert_eq!(rows[0]["level"], Value::from("1"));
        assert!(fx.rows(USER_EXTEND).len() == 2);
    }
}
