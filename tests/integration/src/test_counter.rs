//! Increment and decrement tests.

#[cfg(test)]
mod tests {
    use sqlext_core::ErrorCode;
    use sqlext_model::Value;

    use crate::Fixture;

    #[test]
    fn test_should_restore_value_after_increment_and_decrement() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice", "Bob"]);
        let model = fx.db.model("user u").where_pri(1);

        model.increment("score", 5)?;
        assert_eq!(fx.user(1)["score"], Value::Int(15));
        model.decrement("score", 5)?;
        assert_eq!(fx.user(1)["score"], Value::Int(10));
        assert_eq!(fx.user(2)["score"], Value::Int(10));
        Ok(())
    }

    #[test]
    fn test_should_support_fractional_amounts() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        fx.db.model("user u").where_pri(1).increment("score", 0.5)?;

        assert_eq!(fx.user(1)["score"], Value::Float(10.5));
        Ok(())
    }

    #[test]
    fn test_should_leave_value_for_non_numeric_amount() -> anyhow::Result<()> {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let result = fx
            .db
            .model("user u")
            .where_pri(1)
            .increment("score", "five")?;

        assert_eq!(result.rows_affected, 1);
        let user = fx.user(1);
        assert_eq!(user["score"], Value::Int(10));
        assert!(user["updated_at"].as_str().is_some_and(|t| t.len() == 19));
        Ok(())
    }

    #[test]
    fn test_should_require_where_for_counters() {
        let fx = Fixture::new();
        fx.seed_users(&["Alice"]);

        let err = fx.db.model("user u").increment("score", 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }
}
