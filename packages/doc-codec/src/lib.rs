//! # trash-doc-codec
//!
//! Read-modify-write helpers for instance variables that hold a JSON array
//! or a JSON object, typically the `items` variable of collection-like
//! instances.
//!
//! A variable may hold the collection either as JSON text (a JSON string
//! whose contents are an encoded array or object) or inline as a decoded
//! JSON value. Both are accepted on the way in; [`JsonArray::to_json`] and
//! [`JsonObject::to_json`] always produce text on the way out.
//!
//! ## Edge-case policy
//!
//! - Malformed or absent input is an empty collection, never a decode error.
//! - Negative array indices address from the end (`-1` is the last element).
//! - Reads outside the collection return `None`, which renders as `""`.
//! - Writes outside the collection are silent no-ops.
//!
//! ## Example
//!
//! ```rust
//! use trash_doc_codec::{render_opt, JsonArray};
//!
//! let mut items = JsonArray::parse(r#"["a", "b"]"#);
//! items.push(serde_json::json!("c"));
//!
//! assert_eq!(render_opt(items.get(-1)), "c");
//! assert_eq!(render_opt(items.get(10)), "");
//! assert_eq!(items.to_json().unwrap(), r#"["a","b","c"]"#);
//! ```

mod array;
mod error;
mod object;

use serde_json::Value as JsonValue;

pub use array::JsonArray;
pub use error::Error;
pub use object::JsonObject;

/// Render a JSON value as the plain text handed back to callers.
///
/// Strings come back unquoted, numbers in decimal form, booleans as `true` or
/// `false`, and `null` as the empty string. Arrays and objects are rendered as
/// compact JSON text.
pub fn render(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

/// Render an optional lookup result; a missing value renders as `""`.
pub fn render_opt(value: Option<&JsonValue>) -> String {
    value.map(render).unwrap_or_default()
}

/// Interpret a selector argument as a signed collection index.
///
/// Accepts integral JSON numbers and strings holding an integer. Anything
/// else yields `None`.
pub fn index_from_value(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn decode_text(text: &str) -> Option<JsonValue> {
    serde_json::from_str(text).ok()
}
