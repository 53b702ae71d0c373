//! core::config
//!
//! Store configuration schema and loading.
//!
//! # Overview
//!
//! Reconciliation itself has no tunables; what is configurable is the
//! environment around it, chiefly how long a writer waits for the
//! process-shared lock before giving up.
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$MODSTORE_CONFIG` if set
//! 2. `<base>/config.toml`
//!
//! A missing file is not an error; defaults apply.
//!
//! # Example
//!
//! ```
//! use modstore::core::config::StoreConfig;
//!
//! let config: StoreConfig = toml::from_str(
//!     "[lock]\ntimeout_ms = 2000\npoll_ms = 20\n",
//! ).unwrap();
//! assert_eq!(config.lock.timeout_ms, 2000);
//! assert!(config.store.bootstrap); // defaulted
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::paths::StorePaths;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "MODSTORE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Lock acquisition policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// How long a contender waits for the lock, in milliseconds.
    /// Zero means a single non-blocking attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Poll interval while waiting, in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_poll_ms() -> u64 {
    50
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl LockConfig {
    /// The wait deadline as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Store behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Whether loading may bootstrap an empty tree when no document exists.
    #[serde(default = "default_bootstrap")]
    pub bootstrap: bool,
}

fn default_bootstrap() -> bool {
    true
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            bootstrap: default_bootstrap(),
        }
    }
}

/// Complete store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Lock acquisition policy.
    #[serde(default)]
    pub lock: LockConfig,

    /// Store behavior settings.
    #[serde(default)]
    pub store: StoreSection,
}

impl StoreConfig {
    /// Load configuration for a store, with defaults for anything absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or
    /// parsed, or if loaded values are invalid. A missing file is fine.
    pub fn load(paths: &StorePaths) -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_file(&path)?;
                config.validate()?;
                return Ok(config);
            }
        }

        let path = paths.config_path();
        if path.exists() {
            let config = Self::read_file(&path)?;
            config.validate()?;
            return Ok(config);
        }

        Ok(Self::default())
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate loaded values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock.poll_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "lock.poll_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
