//! Install-root and database location.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the install root.
pub const HOME_VAR: &str = "TRASH_HOME";
/// Environment variable naming the instance database file.
pub const DB_VAR: &str = "TRASH_DB";
/// Environment variable holding the SQLite busy timeout in milliseconds.
pub const BUSY_TIMEOUT_VAR: &str = "TRASH_BUSY_TIMEOUT_MS";

pub const DEFAULT_ROOT_DIR: &str = ".trashtalk";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No install root configured and no home directory found")]
    NoHomeDirectory,

    #[error("Invalid {var} value '{value}': expected milliseconds")]
    InvalidBusyTimeout { var: &'static str, value: String },
}

/// Unresolved settings. Anything left unset falls back to the environment
/// and then to defaults when [`Config::resolve`] runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    install_root: Option<PathBuf>,
    store_path: Option<PathBuf>,
    busy_timeout: Option<Duration>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = Some(root.into());
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Resolve against the process environment and the user's home directory.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        self.resolve_with(|name| std::env::var(name).ok(), dirs::home_dir())
    }

    /// Resolve against an explicit environment lookup and home directory.
    pub fn resolve_with<F>(
        &self,
        env: F,
        home: Option<PathBuf>,
    ) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let install_root = match (&self.install_root, non_empty(&env, HOME_VAR)) {
            (Some(root), _) => root.clone(),
            (None, Some(root)) => PathBuf::from(root),
            (None, None) => home
                .map(|home| home.join(DEFAULT_ROOT_DIR))
                .ok_or(ConfigError::NoHomeDirectory)?,
        };

        let store_path = match (&self.store_path, non_empty(&env, DB_VAR)) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => PathBuf::from(path),
            (None, None) => install_root.join("db").join("instances.db"),
        };

        let busy_timeout = match (self.busy_timeout, non_empty(&env, BUSY_TIMEOUT_VAR)) {
            (Some(timeout), _) => timeout,
            (None, Some(value)) => match value.trim().parse::<u64>() {
                Ok(millis) => Duration::from_millis(millis),
                Err(_) => {
                    return Err(ConfigError::InvalidBusyTimeout {
                        var: BUSY_TIMEOUT_VAR,
                        value,
                    })
                }
            },
            (None, None) => DEFAULT_BUSY_TIMEOUT,
        };

        log::debug!(
            "Resolved install root {} with store {}",
            install_root.display(),
            store_path.display()
        );

        Ok(ResolvedConfig {
            install_root,
            store_path,
            busy_timeout,
        })
    }
}

fn non_empty<F>(env: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(name).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub install_root: PathBuf,
    pub store_path: PathBuf,
    pub busy_timeout: Duration,
}

impl ResolvedConfig {
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// The external interpreter's message-send entry point.
    pub fn fallback_executable(&self) -> PathBuf {
        self.install_root.join("bin").join("trash-send")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_under_home() {
        let resolved = Config::new()
            .resolve_with(env(&[]), Some(PathBuf::from("/home/u")))
            .unwrap();
        assert_eq!(resolved.install_root, PathBuf::from("/home/u/.trashtalk"));
        assert_eq!(
            resolved.store_path,
            PathBuf::from("/home/u/.trashtalk/db/instances.db")
        );
        assert_eq!(resolved.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert_eq!(
            resolved.fallback_executable(),
            PathBuf::from("/home/u/.trashtalk/bin/trash-send")
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let resolved = Config::new()
            .resolve_with(
                env(&[(HOME_VAR, "/opt/trash"), (BUSY_TIMEOUT_VAR, "250")]),
                Some(PathBuf::from("/home/u")),
            )
            .unwrap();
        assert_eq!(resolved.install_root, PathBuf::from("/opt/trash"));
        assert_eq!(
            resolved.store_path,
            PathBuf::from("/opt/trash/db/instances.db")
        );
        assert_eq!(resolved.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn db_var_is_independent_of_root() {
        let resolved = Config::new()
            .resolve_with(
                env(&[(DB_VAR, "/tmp/x.db")]),
                Some(PathBuf::from("/home/u")),
            )
            .unwrap();
        assert_eq!(resolved.install_root, PathBuf::from("/home/u/.trashtalk"));
        assert_eq!(resolved.store_path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn explicit_settings_win() {
        let resolved = Config::new()
            .with_install_root("/srv/trash")
            .with_store_path("/srv/data.db")
            .with_busy_timeout(Duration::from_secs(1))
            .resolve_with(
                env(&[
                    (HOME_VAR, "/opt/trash"),
                    (DB_VAR, "/tmp/x.db"),
                    (BUSY_TIMEOUT_VAR, "250"),
                ]),
                None,
            )
            .unwrap();
        assert_eq!(resolved.install_root(), Path::new("/srv/trash"));
        assert_eq!(resolved.store_path(), Path::new("/srv/data.db"));
        assert_eq!(resolved.busy_timeout, Duration::from_secs(1));
    }

    #[test]
    fn empty_variables_are_ignored() {
        let resolved = Config::new()
            .resolve_with(env(&[(HOME_VAR, "")]), Some(PathBuf::from("/home/u")))
            .unwrap();
        assert_eq!(resolved.install_root, PathBuf::from("/home/u/.trashtalk"));
    }

    #[test]
    fn missing_home() {
        let err = Config::new().resolve_with(env(&[]), None).unwrap_err();
        assert!(matches!(err, ConfigError::NoHomeDirectory));
    }

    #[test]
    fn malformed_timeout() {
        let err = Config::new()
            .with_install_root("/srv/trash")
            .resolve_with(env(&[(BUSY_TIMEOUT_VAR, "soon")]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidBusyTimeout { ref value, .. } if value == "soon"
        ));
    }
}
