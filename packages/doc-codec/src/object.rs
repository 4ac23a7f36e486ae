//! JSON object instance variables.
//!
//! Entries are kept in a `BTreeMap` so key listings and encoded text are
//! lexicographically ordered regardless of insertion order.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::{decode_text, Error};

/// A JSON object decoded leniently from an instance variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonObject {
    entries: BTreeMap<String, JsonValue>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode object text. Anything that is not a JSON object is treated as `{}`.
    pub fn parse(text: &str) -> Self {
        match decode_text(text) {
            Some(JsonValue::Object(map)) => Self {
                entries: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    /// Decode the stored value of an instance variable, held either as JSON
    /// text or inline.
    pub fn from_value(value: Option<&JsonValue>) -> Self {
        match value {
            Some(JsonValue::String(text)) => Self::parse(text),
            Some(JsonValue::Object(map)) => Self {
                entries: map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
            _ => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn put(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.entries.remove(key)
    }

    /// Keys in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Encode the object back to JSON text with keys in sorted order.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}
