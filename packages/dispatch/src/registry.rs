//! The `(class, selector)` handler table.
//!
//! Lookup tries the exact class first and then the wildcard class `*`, which
//! stands in for the root every class inherits from. There is exactly one
//! fallback hop; no class hierarchy is walked.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use trash_instance_store::Instance;

use crate::HandlerError;

/// Class key matched by every class without an exact handler.
pub const WILDCARD_CLASS: &str = "*";

/// What a behavior sees besides the instance and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
    pub class: String,
    pub selector: String,
    pub id: String,
}

impl HandlerContext {
    pub fn new(class: &str, selector: &str, id: &str) -> Self {
        Self {
            class: class.to_string(),
            selector: selector.to_string(),
            id: id.to_string(),
        }
    }

    /// Fetch positional argument `position`, failing if fewer than
    /// `expected` arguments were supplied.
    pub fn argument<'a>(
        &self,
        args: &'a [JsonValue],
        position: usize,
        expected: usize,
    ) -> Result<&'a JsonValue, HandlerError> {
        if args.len() < expected {
            return Err(HandlerError::MissingArgument {
                selector: self.selector.clone(),
                expected,
                given: args.len(),
            });
        }
        args.get(position).ok_or_else(|| HandlerError::MissingArgument {
            selector: self.selector.clone(),
            expected,
            given: args.len(),
        })
    }

    pub fn invalid_argument(&self, message: impl Into<String>) -> HandlerError {
        HandlerError::InvalidArgument {
            selector: self.selector.clone(),
            message: message.into(),
        }
    }
}

/// A native implementation of a selector.
pub type Behavior = Arc<
    dyn Fn(&HandlerContext, &mut Instance, &[JsonValue]) -> Result<String, HandlerError>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<BTreeMap<(String, String), Behavior>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the behavior for `(class, selector)`.
    pub fn register<F>(&self, class: &str, selector: &str, behavior: F)
    where
        F: Fn(&HandlerContext, &mut Instance, &[JsonValue]) -> Result<String, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register_behavior(class, selector, Arc::new(behavior));
    }

    pub fn register_behavior(&self, class: &str, selector: &str, behavior: Behavior) {
        log::trace!("Registering handler {}>>{}", class, selector);
        self.handlers
            .write()
            .insert((class.to_string(), selector.to_string()), behavior);
    }

    /// Remove the exact `(class, selector)` entry. Returns whether one existed.
    pub fn unregister(&self, class: &str, selector: &str) -> bool {
        self.handlers
            .write()
            .remove(&(class.to_string(), selector.to_string()))
            .is_some()
    }

    /// Resolve `selector` for `class`, falling back to the wildcard class.
    pub fn lookup(&self, class: &str, selector: &str) -> Option<Behavior> {
        let handlers = self.handlers.read();
        handlers
            .get(&(class.to_string(), selector.to_string()))
            .or_else(|| handlers.get(&(WILDCARD_CLASS.to_string(), selector.to_string())))
            .cloned()
    }

    /// Whether an exact entry exists, ignoring the wildcard fallback.
    pub fn contains(&self, class: &str, selector: &str) -> bool {
        self.handlers
            .read()
            .contains_key(&(class.to_string(), selector.to_string()))
    }

    /// Every registered `(class, selector)` pair, sorted.
    pub fn list_handlers(&self) -> Vec<(String, String)> {
        self.handlers.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
