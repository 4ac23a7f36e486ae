//! In-memory document store.
//!
//! Keeps documents in a sorted map. Useful for tests and for embedding the
//! cache without a database file. Writes can be switched off to exercise
//! persistence failure paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use crate::instance::CLASS_KEY;
use crate::{BackendError, DocumentStore};

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `put` and `delete` fails.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn check_writable(&self) -> Result<(), BackendError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(BackendError::Other {
                message: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<String>, BackendError> {
        Ok(self.documents.read().get(id).cloned())
    }

    fn put(&self, id: &str, document: &str) -> Result<(), BackendError> {
        self.check_writable()?;
        // Match the SQLite backend, which refuses malformed JSON.
        serde_json::from_str::<JsonValue>(document).map_err(|error| BackendError::Other {
            message: format!("malformed document: {}", error),
        })?;
        self.documents
            .write()
            .insert(id.to_string(), document.to_string());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.check_writable()?;
        self.documents.write().remove(id);
        Ok(())
    }

    fn find_by_class(&self, class: &str) -> Result<Vec<String>, BackendError> {
        let documents = self.documents.read();
        Ok(documents
            .iter()
            .filter(|(_, document)| {
                serde_json::from_str::<JsonValue>(document)
                    .ok()
                    .and_then(|value| {
                        value
                            .get(CLASS_KEY)
                            .and_then(JsonValue::as_str)
                            .map(|found| found == class)
                    })
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect())
    }
}
