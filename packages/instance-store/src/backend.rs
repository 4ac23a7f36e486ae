//! The document store seam.
//!
//! A backend persists one JSON document per instance id. It knows nothing
//! about caching or instance structure beyond the `class` field used by
//! [`DocumentStore::find_by_class`].

use crate::BackendError;

pub trait DocumentStore: Send + Sync {
    /// Fetch the document stored under `id`, if any.
    fn get(&self, id: &str) -> Result<Option<String>, BackendError>;

    /// Insert or replace the document stored under `id`.
    fn put(&self, id: &str, document: &str) -> Result<(), BackendError>;

    /// Remove the document stored under `id`. Removing a missing id is not
    /// an error.
    fn delete(&self, id: &str) -> Result<(), BackendError>;

    /// Ids of every stored document whose `class` field equals `class`, in
    /// backend-defined order.
    fn find_by_class(&self, class: &str) -> Result<Vec<String>, BackendError>;

    /// Release the backend's resources.
    fn close(self) -> Result<(), BackendError>
    where
        Self: Sized,
    {
        Ok(())
    }
}
