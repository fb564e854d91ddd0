//! Core configuration and error types for sqlext.
//!
//! This crate provides the building blocks shared by every sqlext crate: the
//! [`SqlextConfig`] that drives naming conventions for extension tables, and
//! the [`SqlextError`] returned by all fallible operations.

mod config;
mod error;

pub use config::{DialectKind, SqlextConfig};
pub use error::{ErrorCode, SqlextError, SqlextResult};
