//! Error types for the instance store.

/// Failures reported by a [`DocumentStore`](crate::DocumentStore) backend.
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Other { message: String },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Instance not found: {id}")]
    InstanceNotFound { id: String },

    #[error("An error occurred while serializing instance {id}: {source}")]
    Serialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("An error occurred while deserializing instance {id}: {source}")]
    Deserialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document store {operation} failed for ({key}): {source}")]
    Backend {
        operation: &'static str,
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Instance variable ({name}) is reserved for a standard field")]
    ReservedField { name: String },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::InstanceNotFound { .. })
    }

    pub(crate) fn backend(operation: &'static str, key: &str) -> impl FnOnce(BackendError) -> Self {
        let key = key.to_string();
        move |source| Error::Backend {
            operation,
            key,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn not_found_display() {
        let e = Error::InstanceNotFound {
            id: "counter_1".to_string(),
        };
        assert!(e.is_not_found());
        assert!(format!("{}", e).contains("counter_1"));
    }

    #[test]
    fn backend_error_carries_context_and_source() {
        let e = Error::backend("put", "counter_1")(BackendError::Other {
            message: "disk full".to_string(),
        });
        let display = format!("{}", e);
        assert!(display.contains("put"));
        assert!(display.contains("counter_1"));
        assert!(display.contains("disk full"));
        assert!(StdError::source(&e).is_some());
        assert!(!e.is_not_found());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: BackendError = io_err.into();
        assert!(matches!(e, BackendError::Io(_)));
    }
}
