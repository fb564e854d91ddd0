//! In-memory backend for sqlext models.
//!
//! [`MemoryExecutor`] interprets the structured statements built by
//! `sqlext-orm` against tables held in process, and journals the SQL each
//! statement renders to. [`MemoryCache`] is a [`sqlext_orm::ResponseCache`]
//! for the same setting. Together they let models run end to end without a
//! database server.

mod cache;
mod executor;
mod query;
pub mod state;
pub mod storage;

pub use cache::MemoryCache;
pub use executor::MemoryExecutor;
pub use state::MemoryState;
pub use storage::{AUTO_ID, InsertOutcome, StorageError, TableSchema, TableStorage};
