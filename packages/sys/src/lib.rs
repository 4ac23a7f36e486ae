//! # trash-sys
//!
//! The parts of the runtime that touch the host system.
//!
//! - [`Config`]: where the install root and the shared instance database
//!   live, resolved from explicit overrides, then environment variables, then
//!   defaults under the home directory.
//! - [`FallbackBridge`]: runs the external interpreter's `trash-send` entry
//!   point for selectors with no native behavior.

pub mod bridge;
pub mod config;

pub use bridge::{BridgeError, FallbackBridge, UNKNOWN_SELECTOR_EXIT_CODE};
pub use config::{Config, ConfigError, ResolvedConfig};
