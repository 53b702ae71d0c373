//! metadata::storage
//!
//! Whole-document persistence boundary.
//!
//! # Architecture
//!
//! The platform's persistence layer owns where registry bytes live; the
//! registry only needs `load` and `store` over the complete document.
//! [`TreeStorage`] is that boundary, and [`FileStorage`] is the stock
//! file-backed implementation.
//!
//! # Invariants
//!
//! - No partial or append writes: `store` replaces the whole document
//! - A concurrent reader observes either the old or the new document,
//!   never a mix (write to a temp file, then rename over the target)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors from document storage. These are the fatal I/O class: the
/// requested operation is abandoned and the metadata tree left untouched.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing document could not be read.
    #[error("failed to read registry document '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The backing document could not be written.
    #[error("failed to write registry document '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Load/store access to the persisted registry document.
///
/// `load` returns `None` when no document exists yet (a fresh system
/// instance); the codec decides whether that bootstraps or fails.
pub trait TreeStorage {
    /// Read the complete document, or `None` if absent.
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the complete document.
    fn store(&self, bytes: &[u8]) -> Result<(), StorageError>;
}

/// File-backed storage with atomic whole-file replacement.
///
/// # Example
///
/// ```no_run
/// use modstore::metadata::storage::{FileStorage, TreeStorage};
/// use std::path::PathBuf;
///
/// let storage = FileStorage::new(PathBuf::from("/var/lib/modstore/registry.json"));
/// assert!(storage.load().unwrap().is_none());
/// storage.store(b"{}").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create storage backed by the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn write_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl TreeStorage for FileStorage {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                debug!(path = %self.path.display(), len = bytes.len(), "loaded registry document");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.read_err(e)),
        }
    }

    fn store(&self, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;
        }

        // Write the replacement next to the target, sync, then rename over
        // it. Rename within one directory is atomic, so readers never see
        // a torn document.
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| self.write_err(e))?;
            tmp.write_all(bytes).map_err(|e| self.write_err(e))?;
            tmp.sync_all().map_err(|e| self.write_err(e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| self.write_err(e))?;

        debug!(path = %self.path.display(), len = bytes.len(), "stored registry document");
        Ok(())
    }
}
