//! Subprocess bridge to the external interpreter.
//!
//! Selectors without a native behavior are forwarded as
//! `trash-send <receiver> <selector> <args...>`. The interpreter prints the
//! result on stdout and signals "no such selector" with a dedicated exit code.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::ResolvedConfig;

/// Exit status the interpreter uses when the receiver does not understand
/// the selector.
pub const UNKNOWN_SELECTOR_EXIT_CODE: i32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{receiver} does not understand {selector}")]
    UnknownSelector { receiver: String, selector: String },

    #[error("{receiver}>>{selector} failed ({}): {stderr}", describe_code(.code))]
    Failed {
        receiver: String,
        selector: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to run {executable} for {receiver}>>{selector}: {source}")]
    Spawn {
        receiver: String,
        selector: String,
        executable: String,
        #[source]
        source: io::Error,
    },
}

impl BridgeError {
    pub fn is_unknown_selector(&self) -> bool {
        matches!(self, BridgeError::UnknownSelector { .. })
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackBridge {
    executable: PathBuf,
}

impl FallbackBridge {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.fallback_executable())
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run the interpreter for one message send and return its stdout with
    /// trailing whitespace removed.
    pub fn send_message(
        &self,
        receiver: &str,
        selector: &str,
        args: &[String],
    ) -> Result<String, BridgeError> {
        log::debug!(
            "Forwarding {}>>{} with {} argument(s) to {}",
            receiver,
            selector,
            args.len(),
            self.executable.display()
        );

        let output = Command::new(&self.executable)
            .arg(receiver)
            .arg(selector)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BridgeError::Spawn {
                receiver: receiver.to_string(),
                selector: selector.to_string(),
                executable: self.executable.display().to_string(),
                source,
            })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(stdout.trim_end().to_string());
        }

        match output.status.code() {
            Some(UNKNOWN_SELECTOR_EXIT_CODE) => Err(BridgeError::UnknownSelector {
                receiver: receiver.to_string(),
                selector: selector.to_string(),
            }),
            code => Err(BridgeError::Failed {
                receiver: receiver.to_string(),
                selector: selector.to_string(),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            }),
        }
    }
}
