//! Error types for the document codec.
//!
//! Reads never fail: malformed input degrades to an empty collection. The
//! only fallible operation is encoding a collection back to JSON text.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("An error occurred while encoding a collection: {0}")]
    Encode(#[from] serde_json::Error),
}
