//! # trash-instance-store
//!
//! Persistent instances and the write-back cache in front of them.
//!
//! - [`Instance`]: a class name, an id and an open property bag, stored as a
//!   single JSON document.
//! - [`DocumentStore`]: the backend seam, with [`SqliteStore`] for the
//!   shared on-disk database and [`MemoryStore`] for tests.
//! - [`InstanceStore`]: the cache. Loads read through on a miss, mutations
//!   mark entries dirty, and [`InstanceStore::flush`] writes them back.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use trash_instance_store::{InstanceStore, MemoryStore};
//!
//! let store = InstanceStore::new(MemoryStore::new());
//! let defaults = json!({"value": 0}).as_object().cloned().unwrap();
//! let (id, _) = store.create("Counter", &defaults).unwrap();
//! assert!(id.starts_with("counter_"));
//!
//! store.set_var(&id, "value", json!(1)).unwrap();
//! assert!(store.is_dirty(&id));
//! store.flush().unwrap();
//! assert!(!store.is_dirty(&id));
//! ```

mod backend;
mod cache;
mod error;
mod in_memory;
pub mod instance;
mod sqlite;

pub use backend::DocumentStore;
pub use cache::{CacheEntry, CacheStats, FlushFailure, FlushReport, InstanceStore, SuffixGenerator};
pub use error::{BackendError, Error};
pub use in_memory::MemoryStore;
pub use instance::Instance;
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
