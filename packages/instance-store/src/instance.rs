//! The in-memory form of a persisted instance.
//!
//! An [`Instance`] keeps its standard fields (`class`, `created_at`, declared
//! variables) both as typed fields and mirrored inside its `data` map, which
//! is the document written to the store. The mirror is reconciled at the
//! serialization boundary and the variable accessors refuse to touch the
//! reserved keys, so the two views cannot drift apart.

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::Error;

/// Document key holding the class name.
pub const CLASS_KEY: &str = "class";
/// Document key holding the RFC 3339 creation timestamp.
pub const CREATED_AT_KEY: &str = "created_at";
/// Document key holding the declared variable names.
pub const VARS_KEY: &str = "_vars";

/// Keys of the standard fields mirrored into every document.
pub const RESERVED_KEYS: [&str; 3] = [CLASS_KEY, CREATED_AT_KEY, VARS_KEY];

/// Separator between namespace segments of a qualified class name.
pub const NAMESPACE_SEPARATOR: &str = "::";

pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

#[derive(Debug, Clone)]
pub struct Instance {
    id: String,
    class: String,
    created_at: DateTime<Utc>,
    vars: Vec<String>,
    data: JsonMap<String, JsonValue>,
    modified: bool,
}

impl Instance {
    /// Build a fresh instance seeded from `defaults`.
    ///
    /// Every default key except the reserved ones becomes a declared variable.
    pub fn new(
        id: impl Into<String>,
        class: impl Into<String>,
        created_at: DateTime<Utc>,
        defaults: &JsonMap<String, JsonValue>,
    ) -> Self {
        let vars = defaults
            .keys()
            .filter(|key| !is_reserved(key))
            .cloned()
            .collect();
        let mut instance = Self {
            id: id.into(),
            class: class.into(),
            created_at,
            vars,
            data: defaults.clone(),
            modified: false,
        };
        instance.mirror_standard_fields();
        instance
    }

    /// Derive an instance id from its class name and a unique suffix.
    ///
    /// `MyApp::Counter` with suffix `abc` becomes `myapp_counter_abc`.
    pub fn derive_id(class: &str, suffix: &str) -> String {
        format!(
            "{}_{}",
            class.replace(NAMESPACE_SEPARATOR, "_").to_lowercase(),
            suffix
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Declared variable names, in declaration order.
    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    /// The full document, standard fields included.
    pub fn data(&self) -> &JsonMap<String, JsonValue> {
        &self.data
    }

    pub fn get_var(&self, name: &str) -> Option<&JsonValue> {
        self.data.get(name)
    }

    /// Set a variable, returning its previous value.
    ///
    /// Any key may be written except the reserved standard-field keys.
    pub fn set_var(
        &mut self,
        name: &str,
        value: JsonValue,
    ) -> Result<Option<JsonValue>, Error> {
        Self::check_writable(name)?;
        self.modified = true;
        Ok(self.data.insert(name.to_string(), value))
    }

    pub fn remove_var(&mut self, name: &str) -> Result<Option<JsonValue>, Error> {
        Self::check_writable(name)?;
        let previous = self.data.remove(name);
        if previous.is_some() {
            self.modified = true;
        }
        Ok(previous)
    }

    /// Whether a variable was mutated since the flag was last taken.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn take_modified(&mut self) -> bool {
        std::mem::take(&mut self.modified)
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    fn check_writable(name: &str) -> Result<(), Error> {
        if is_reserved(name) {
            return Err(Error::ReservedField {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn mirror_standard_fields(&mut self) {
        self.data
            .insert(CLASS_KEY.to_string(), JsonValue::String(self.class.clone()));
        self.data.insert(
            CREATED_AT_KEY.to_string(),
            JsonValue::String(self.created_at.to_rfc3339()),
        );
        if self.vars.is_empty() {
            self.data.remove(VARS_KEY);
        } else {
            self.data.insert(
                VARS_KEY.to_string(),
                JsonValue::Array(self.vars.iter().cloned().map(JsonValue::String).collect()),
            );
        }
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> JsonValue {
        let mut document = self.clone();
        document.mirror_standard_fields();
        JsonValue::Object(document.data)
    }

    /// Encode the document written to the store.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_value())
    }

    /// Rebuild an instance from a stored document.
    ///
    /// The document must be a JSON object carrying a string `class`. A
    /// missing or unparsable `created_at` falls back to the Unix epoch, and a
    /// missing `_vars` means no declared variables.
    pub fn from_json(id: impl Into<String>, document: &str) -> Result<Self, serde_json::Error> {
        use serde::de::Error as _;

        let data: JsonMap<String, JsonValue> = serde_json::from_str(document)?;
        let class = data
            .get(CLASS_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| serde_json::Error::custom("document has no string `class` field"))?
            .to_string();
        let created_at = data
            .get(CREATED_AT_KEY)
            .and_then(JsonValue::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|time| time.with_timezone(&Utc))
            .unwrap_or_default();
        let vars = match data.get(VARS_KEY) {
            Some(JsonValue::Array(names)) => names
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let mut instance = Self {
            id: id.into(),
            class,
            created_at,
            vars,
            data,
            modified: false,
        };
        instance.mirror_standard_fields();
        Ok(instance)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.class == other.class
            && self.created_at == other.created_at
            && self.vars == other.vars
            && self.data == other.data
    }
}
