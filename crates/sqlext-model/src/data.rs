//! Write payloads.
//!
//! A payload is either a column mapping or a raw SQL assignment list. Column
//! mappings hold plain values or [`Counter`] directives, the latter rendered
//! as `column = column + delta` by the execution layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Record, Value};

/// A signed numeric delta applied to a column in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    /// The column to adjust.
    pub field: String,
    /// The delta added to the current value.
    pub value: f64,
}

impl Counter {
    /// Create a counter directive.
    #[must_use]
    pub fn new(field: impl Into<String>, value: f64) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }

    /// The delta as a value, integral when it has no fractional part.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn delta(&self) -> Value {
        if self.value.fract() == 0.0 && self.value.abs() < 9.0e15 {
            Value::Int(self.value as i64)
        } else {
            Value::Float(self.value)
        }
    }
}

/// One entry of a column mapping payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Assign the value.
    Set(Value),
    /// Add a delta to the current value.
    Counter(Counter),
}

impl DataValue {
    /// The assigned value, if this is a plain assignment.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Set(v) => Some(v),
            Self::Counter(_) => None,
        }
    }
}

impl<T: Into<Value>> From<T> for DataValue {
    fn from(v: T) -> Self {
        Self::Set(v.into())
    }
}

impl From<Counter> for DataValue {
    fn from(c: Counter) -> Self {
        Self::Counter(c)
    }
}

/// Write payload for updates.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Column mapping.
    Map(BTreeMap<String, DataValue>),
    /// Raw SQL assignment list, e.g. `name = 'a', score = score + 1`.
    Raw(String),
}

impl Data {
    /// An empty column mapping.
    #[must_use]
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Builder-style insertion into a column mapping.
    ///
    /// A raw payload is left unchanged.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DataValue>) -> Self {
        if let Self::Map(map) = &mut self {
            map.insert(column.into(), value.into());
        }
        self
    }

    /// Whether the payload carries nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Raw(raw) => raw.trim().is_empty(),
        }
    }

    /// Borrow the column mapping, if any.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, DataValue>> {
        match self {
            Self::Map(map) => Some(map),
            Self::Raw(_) => None,
        }
    }

    /// Plain value stored under `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)?.as_value()
    }

    /// Build a column mapping from a JSON object.
    ///
    /// Returns `None` when `json` is not an object.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        let serde_json::Value::Object(obj) = json else {
            return None;
        };
        Some(Self::Map(
            obj.into_iter()
                .map(|(k, v)| (k, DataValue::Set(Value::from_json(v))))
                .collect(),
        ))
    }
}

impl From<Record> for Data {
    fn from(record: Record) -> Self {
        Self::Map(
            record
                .into_iter()
                .map(|(k, v)| (k, DataValue::Set(v)))
                .collect(),
        )
    }
}

impl From<&str> for Data {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_owned())
    }
}

impl From<String> for Data {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}
