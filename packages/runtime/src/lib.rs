//! # trash-runtime
//!
//! One handle over the instance store, the native dispatcher and the
//! interpreter bridge.
//!
//! [`Runtime::send`] tries the native behavior table first. Selectors it
//! does not cover are forwarded to the external interpreter, with the
//! instance's cached state written back beforehand and dropped afterwards so
//! both sides see the same document.

mod error;
mod runtime;

pub use error::RuntimeError;
pub use runtime::Runtime;
