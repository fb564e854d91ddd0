//! Attribute bag decoded from a write payload.
//!
//! The bag travels inside the payload as a JSON object encoded in a string,
//! under one of the keys in [`BAG_KEYS`]. The first key holding a non-empty
//! value wins.

use std::collections::BTreeMap;
use std::collections::btree_map;

use sqlext_core::SqlextError;

use crate::data::{Data, DataValue};
use crate::value::Value;

/// Payload keys that may carry the attribute bag, in lookup order.
pub const BAG_KEYS: [&str; 3] = ["ExtData", "extData", "ext_data"];

/// Ordered mapping from attribute name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    entries: BTreeMap<String, Value>,
}

impl AttributeBag {
    /// Extract and decode the bag carried by `data`.
    ///
    /// Raw payloads and payloads without a bag key yield an empty bag.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error if the selected value is not a JSON object.
    pub fn from_payload(data: &Data) -> Result<Self, SqlextError> {
        let Some(map) = data.as_map() else {
            return Ok(Self::default());
        };
        let selected = BAG_KEYS.iter().find_map(|key| match map.get(*key) {
            Some(DataValue::Set(v)) if !v.is_empty() => Some((*key, v)),
            _ => None,
        });
        match selected {
            Some((key, Value::String(text))) => Self::decode(text).map_err(|e| {
                SqlextError::decode(format!("invalid attribute bag under '{key}': {}", e.message))
            }),
            Some((key, other)) => Err(SqlextError::decode(format!(
                "attribute bag under '{key}' must be a JSON object string, got {other}"
            ))),
            None => Ok(Self::default()),
        }
    }

    /// Decode a JSON object text.
    ///
    /// # Errors
    ///
    /// Returns a `Decode` error for malformed JSON or a non-object document.
    pub fn decode(text: &str) -> Result<Self, SqlextError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SqlextError::decode(format!("malformed JSON: {e}")).with_source(e))?;
        let serde_json::Value::Object(obj) = json else {
            return Err(SqlextError::decode("expected a JSON object"));
        };
        Ok(Self {
            entries: obj
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect(),
        })
    }

    /// Insert an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a AttributeBag {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, Value)> for AttributeBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Remove all bag keys from a column mapping payload.
#[must_use]
pub fn strip_bag_keys(data: Data) -> Data {
    match data {
        Data::Map(mut map) => {
            for key in BAG_KEYS {
                map.remove(key);
            }
            Data::Map(map)
        }
        raw @ Data::Raw(_) => raw,
    }
}
