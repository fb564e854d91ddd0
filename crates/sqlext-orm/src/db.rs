//! Database handle that models are created from.

use std::sync::Arc;

use sqlext_core::SqlextConfig;

use crate::cache::ResponseCache;
use crate::executor::Executor;
use crate::model::Model;

/// Shared executor, cache, and configuration.
///
/// Cloning is cheap; every model derived from a `Db` shares its parts.
#[derive(Debug, Clone)]
pub struct Db {
    executor: Arc<dyn Executor>,
    cache: Option<Arc<dyn ResponseCache>>,
    config: Arc<SqlextConfig>,
}

impl Db {
    /// A handle running statements on `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, config: SqlextConfig) -> Self {
        Self {
            executor,
            cache: None,
            config: Arc::new(config),
        }
    }

    /// Attach a result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The executor.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SqlextConfig {
        &self.config
    }

    /// A model over `table`, e.g. `"user"` or `"user AS u"`.
    #[must_use]
    pub fn model(&self, table: &str) -> Model {
        Model::new(
            Arc::clone(&self.executor),
            self.cache.clone(),
            Arc::clone(&self.config),
            table,
        )
    }
}
