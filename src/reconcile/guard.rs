//! reconcile::guard
//!
//! Process-shared locking over the registry document.
//!
//! # Architecture
//!
//! Multiple cooperating processes share one persisted tree. At most one
//! writer may hold the lock at a time; readers share it among themselves
//! but exclude the writer. The lock is OS-level file locking, so it holds
//! across processes and is released by the kernel if a holder dies.
//!
//! # Invariants
//!
//! - The writer lock spans the whole reconcile-and-persist sequence
//! - Locks are released on drop (RAII); a panic cannot leak one
//! - Non-blocking acquisition fails fast with [`LockError::Busy`]
//! - Waiting acquisition polls until the configured deadline
//!
//! # Example
//!
//! ```ignore
//! use modstore::core::paths::StorePaths;
//! use modstore::reconcile::guard::StoreLock;
//!
//! let lock = StoreLock::writer(&paths)?;
//!
//! // Load, reconcile, persist while holding the lock
//! // ...
//!
//! // Lock automatically released when dropped
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::core::config::LockConfig;
use crate::core::paths::StorePaths;

/// Errors from locking operations.
///
/// `Busy` and `Timeout` are the transient contention class: the registry is
/// fine, another process just holds the lock. Callers may retry; nothing
/// else in the error taxonomy warrants that.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds a conflicting lock.
    #[error("registry is locked by another process")]
    Busy,

    /// The configured wait deadline expired while the lock stayed held.
    #[error("timed out after {waited_ms}ms waiting for the registry lock")]
    Timeout { waited_ms: u64 },

    /// Failed to create the lock file or its directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of the reader/writer split a guard holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared: excludes writers, coexists with other readers.
    Reader,
    /// Exclusive: excludes everyone.
    Writer,
}

/// A held lock on the registry.
///
/// Released when dropped. Writer guards are exclusive; reader guards are
/// shared.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    mode: LockMode,
    /// The open file handle with the lock held. `Some` while held.
    file: Option<File>,
}

impl StoreLock {
    /// Attempt to acquire the exclusive writer lock, without blocking.
    ///
    /// # Errors
    ///
    /// - [`LockError::Busy`] if any other process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] for other OS lock failures
    pub fn writer(paths: &StorePaths) -> Result<Self, LockError> {
        Self::acquire(paths, LockMode::Writer)
    }

    /// Attempt to acquire a shared reader lock, without blocking.
    ///
    /// Readers coexist with each other but fail with [`LockError::Busy`]
    /// while a writer holds the lock.
    pub fn reader(paths: &StorePaths) -> Result<Self, LockError> {
        Self::acquire(paths, LockMode::Reader)
    }

    /// Acquire the writer lock, polling until the configured deadline.
    ///
    /// A `timeout_ms` of zero degrades to a single non-blocking attempt.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if the deadline expires while the lock is
    /// still held elsewhere.
    pub fn writer_wait(paths: &StorePaths, wait: &LockConfig) -> Result<Self, LockError> {
        Self::acquire_wait(paths, LockMode::Writer, wait)
    }

    /// Acquire a reader lock, polling until the configured deadline.
    pub fn reader_wait(paths: &StorePaths, wait: &LockConfig) -> Result<Self, LockError> {
        Self::acquire_wait(paths, LockMode::Reader, wait)
    }

    fn acquire(paths: &StorePaths, mode: LockMode) -> Result<Self, LockError> {
        paths.ensure_dirs().map_err(|e| {
            LockError::CreateFailed(format!(
                "cannot create {}: {}",
                paths.store_dir().display(),
                e
            ))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))?;

        // Fully qualified so the fs2 trait methods are used even where the
        // standard library grows same-named inherent methods on File.
        let attempt = match mode {
            LockMode::Writer => FileExt::try_lock_exclusive(&file),
            LockMode::Reader => FileExt::try_lock_shared(&file),
        };

        match attempt {
            Ok(()) => {
                debug!(?mode, path = %path.display(), "acquired registry lock");
                Ok(Self {
                    path,
                    mode,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::Busy),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    fn acquire_wait(
        paths: &StorePaths,
        mode: LockMode,
        wait: &LockConfig,
    ) -> Result<Self, LockError> {
        let started = Instant::now();
        loop {
            match Self::acquire(paths, mode) {
                Ok(lock) => return Ok(lock),
                Err(LockError::Busy) => {
                    let waited = started.elapsed();
                    if waited >= wait.timeout() {
                        return Err(LockError::Timeout {
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(wait.poll_interval());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether this guard still holds its lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// The mode this guard was acquired in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Called automatically on drop; use this only to release before the
    /// guard goes out of scope. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            fs2::FileExt::unlock(&file).map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Best-effort release; errors are moot while dropping.
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}

/// Remove a stale lock file.
///
/// Only useful for cleanup tooling; the OS already releases the lock itself
/// when a process dies, so a leftover file is harmless.
pub fn remove_lock_file(paths: &StorePaths) -> std::io::Result<()> {
    match fs::remove_file(paths.lock_path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
