//! core::paths
//!
//! Centralized path routing for registry storage locations.
//!
//! # Storage Layout
//!
//! All registry data lives under one base directory, supplied by the
//! platform (typically its state directory):
//! - `registry.json` - The persisted metadata tree
//! - `lock` - Process-shared lock file
//! - `config.toml` - Store configuration
//!
//! No code outside this module should compute these paths by hand.
//!
//! # Example
//!
//! ```
//! use modstore::core::paths::StorePaths;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::new(PathBuf::from("/var/lib/modstore"));
//! assert_eq!(
//!     paths.registry_path(),
//!     PathBuf::from("/var/lib/modstore/registry.json")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Centralized path routing for registry storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Base directory holding all registry state.
    pub base: PathBuf,
}

impl StorePaths {
    /// Create paths rooted at the given base directory.
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// The base directory as a path reference.
    pub fn store_dir(&self) -> &Path {
        &self.base
    }

    /// Path to the persisted registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.base.join("registry.json")
    }

    /// Path to the process-shared lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.base.join("lock")
    }

    /// Path to the store configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.base.join("config.toml")
    }

    /// Ensure the base directory exists.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)
    }
}
