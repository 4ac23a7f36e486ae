//! JSON array instance variables.

use serde_json::Value as JsonValue;

use crate::{decode_text, Error};

/// A JSON array decoded leniently from an instance variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonArray {
    items: Vec<JsonValue>,
}

impl JsonArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode array text. Anything that is not a JSON array is treated as `[]`.
    pub fn parse(text: &str) -> Self {
        match decode_text(text) {
            Some(JsonValue::Array(items)) => Self { items },
            _ => Self::default(),
        }
    }

    /// Decode the stored value of an instance variable.
    ///
    /// The variable may hold the array as JSON text or inline. An absent
    /// variable, or one holding anything else, is an empty array.
    pub fn from_value(value: Option<&JsonValue>) -> Self {
        match value {
            Some(JsonValue::String(text)) => Self::parse(text),
            Some(JsonValue::Array(items)) => Self {
                items: items.clone(),
            },
            _ => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map a possibly negative index onto a position inside the array.
    fn normalize(&self, index: i64) -> Option<usize> {
        let len = self.items.len() as i64;
        let position = if index < 0 { index + len } else { index };
        if (0..len).contains(&position) {
            Some(position as usize)
        } else {
            None
        }
    }

    pub fn get(&self, index: i64) -> Option<&JsonValue> {
        self.normalize(index).map(|position| &self.items[position])
    }

    /// Replace the element at `index`.
    ///
    /// Returns `false` and leaves the array untouched when the index falls
    /// outside the array after normalization.
    pub fn set(&mut self, index: i64, value: JsonValue) -> bool {
        match self.normalize(index) {
            Some(position) => {
                self.items[position] = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, value: JsonValue) {
        self.items.push(value);
    }

    pub fn pop(&mut self) -> Option<JsonValue> {
        self.items.pop()
    }

    pub fn first(&self) -> Option<&JsonValue> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&JsonValue> {
        self.items.last()
    }

    pub fn remove(&mut self, index: i64) -> Option<JsonValue> {
        self.normalize(index)
            .map(|position| self.items.remove(position))
    }

    /// Encode the array back to JSON text.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.items)?)
    }
}
