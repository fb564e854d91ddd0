//! In-place numeric adjustments.

use sqlext_core::SqlextResult;
use sqlext_model::{Counter, Data, Value};
use tracing::warn;

use crate::executor::ExecResult;
use crate::model::Model;

impl Model {
    /// Add `amount` to `column` of every matching row.
    ///
    /// Runs through [`Model::update`], so the soft-update column is stamped
    /// and a `WHERE` condition is required. An amount that is not a finite
    /// number counts as zero.
    ///
    /// # Errors
    ///
    /// Same as [`Model::update`].
    pub fn increment(&self, column: &str, amount: impl Into<Value>) -> SqlextResult<ExecResult> {
        let delta = numeric(column, &amount.into());
        self.adjust(column, delta)
    }

    /// Subtract `amount` from `column` of every matching row.
    ///
    /// # Errors
    ///
    /// Same as [`Model::increment`].
    pub fn decrement(&self, column: &str, amount: impl Into<Value>) -> SqlextResult<ExecResult> {
        let delta = numeric(column, &amount.into());
        self.adjust(column, -delta)
    }

    fn adjust(&self, column: &str, delta: f64) -> SqlextResult<ExecResult> {
        self.clone()
            .data(Data::map().with(column, Counter::new(column, delta)))
            .update()
    }
}

fn numeric(column: &str, amount: &Value) -> f64 {
    match amount.as_f64().filter(|v| v.is_finite()) {
        Some(v) => v,
        None => {
            warn!(column = %column, amount = %amount, "non-numeric counter amount counted as zero");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlext_core::ErrorCode;
    use sqlext_model::DataValue;

    use super::*;
    use crate::testing::{FakeExecutor, shared_db};

    fn exec() -> FakeExecutor {
        FakeExecutor::default()
            .with_fields("user", &["id", "score", "updated_at"])
            .with_ids(&[1])
    }

    #[test]
    fn test_should_render_increment_as_counter() {
        let (db, exec) = shared_db(exec());
        db.model("user").where_pri(1).increment("score", 2).unwrap();
        let updates = exec.updates.lock();
        let map = updates[0].data.as_map().unwrap();
        assert_eq!(
            map["score"],
            DataValue::Counter(Counter::new("score", 2.0))
        );
        assert!(map.contains_key("updated_at"));
    }

    #[test]
    fn test_should_negate_decrement() {
        let (db, exec) = shared_db(exec());
        db.model("user").where_pri(1).decrement("score", "1.5").unwrap();
        let updates = exec.updates.lock();
        assert_eq!(
            updates[0].data.as_map().unwrap()["score"],
            DataValue::Counter(Counter::new("score", -1.5))
        );
    }

    #[test]
    fn test_should_count_non_numeric_amount_as_zero() {
        let (db, exec) = shared_db(exec());
        let m = db.model("user").where_pri(1);
        m.increment("score", "lots").unwrap();
        m.decrement("score", Value::Null).unwrap();
        let updates = exec.updates.lock();
        for update in updates.iter() {
            let map = update.data.as_map().unwrap();
            assert_eq!(map["score"], DataValue::Counter(Counter::new("score", 0.0)));
        }
        assert_eq!(updates.len(), 2);
    }

    #[test]
    fn test_should_require_where_for_counters() {
        let (db, _) = shared_db(exec());
        let err = db.model("user").increment("score", 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingParameter);
    }
}
