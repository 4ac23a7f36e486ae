use std::path::PathBuf;

use trash_dispatch::HandlerError;
use trash_instance_store::BackendError;
use trash_sys::{BridgeError, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open instance store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Store(#[from] trash_instance_store::Error),

    #[error("{selector} failed on {id}: {source}")]
    Handler {
        id: String,
        selector: String,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl RuntimeError {
    /// Whether neither a native behavior nor the interpreter understood the
    /// selector.
    pub fn is_unknown_selector(&self) -> bool {
        matches!(self, RuntimeError::Bridge(error) if error.is_unknown_selector())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Store(error) if error.is_not_found())
    }
}
