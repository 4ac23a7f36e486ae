//! # trash-dispatch
//!
//! Resolves `(class, selector)` pairs to native behaviors and runs them.
//!
//! - [`HandlerRegistry`]: the behavior table, with a single wildcard
//!   fallback level standing in for "inherited by every class".
//! - [`Dispatcher`]: runs the resolved behavior and reports a three-way
//!   [`Dispatch`] outcome.
//! - [`builtins`]: the behaviors every runtime starts with.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trash_dispatch::{builtins, Dispatch, Dispatcher};
//! use trash_instance_store::Instance;
//!
//! let dispatcher = Dispatcher::new(Arc::new(builtins::registry()));
//! let mut array = Instance::new(
//!     "array_1",
//!     "Array",
//!     chrono::Utc::now(),
//!     serde_json::json!({"items": "[]"}).as_object().unwrap(),
//! );
//!
//! dispatcher.dispatch("push:", &mut array, &[serde_json::json!("a")]);
//! assert!(matches!(
//!     dispatcher.dispatch("size", &mut array, &[]),
//!     Dispatch::Handled(size) if size == "1"
//! ));
//! ```

pub mod builtins;
mod dispatcher;
mod error;
pub mod registry;

pub use dispatcher::{Dispatch, Dispatcher};
pub use error::HandlerError;
pub use registry::{Behavior, HandlerContext, HandlerRegistry, WILDCARD_CLASS};
