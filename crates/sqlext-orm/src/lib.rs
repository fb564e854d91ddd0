//! Model builder with an extension-table overlay.
//!
//! Entities keep their fixed columns in a base table and arbitrary extra
//! attributes in a companion extension table keyed by
//! `(row_key, field_code)`. This crate provides:
//!
//! - [`Model::expands`]: join the extension table and fold its rows into
//!   each result as extra attributes.
//! - [`Model::update`]: conditional updates with soft-field stamping and
//!   cache invalidation.
//! - [`Model::update_extend`]: write a payload's attribute bag to the
//!   extension table alongside the base update.
//! - [`Model::increment`] / [`Model::decrement`]: in-place counters.
//!
//! Statements run through the [`Executor`] trait, so the same models work
//! against any store that implements it.

mod alias;
mod cache;
pub mod condition;
mod counter;
mod db;
mod dialect;
mod executor;
mod expand;
mod model;
mod reconcile;
mod statement;
mod update;

#[cfg(test)]
mod testing;

pub use alias::{AliasBinding, TableRef, resolve_alias};
pub use cache::ResponseCache;
pub use db::Db;
pub use dialect::Dialect;
pub use executor::{ExecResult, Executor};
pub use expand::ExpandOptions;
pub use model::{Expansion, FormattedCondition, Model, PRIMARY_KEY};
pub use reconcile::{ExtendOutput, ReconcileReport};
pub use statement::{
    Filter, InsertStatement, Join, JoinKind, JsonAggregate, OnConflict, Rendered,
    SelectStatement, UpdateStatement,
};
pub use update::{TIME_FORMAT, now_string};
