//! Cross-process advisory locking on a `<path>.lock` sentinel.
//!
//! Readers take a shared lock, writers an exclusive one. The lock is released
//! when the guard drops.

use std::{
    ffi::OsString,
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::{ConfigError, Result};

/// Lock mode held by a [`FileLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers.
    Shared,
    /// Single writer.
    Exclusive,
}

/// RAII guard over an advisory lock on a configuration file's sentinel.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Blocks until a shared lock on `target`'s sentinel is held.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the sentinel cannot be opened or locked.
    pub fn acquire_shared(target: &Path) -> Result<Self> {
        Self::acquire(target, LockMode::Shared)
    }

    /// Blocks until an exclusive lock on `target`'s sentinel is held.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the sentinel cannot be opened or locked.
    pub fn acquire_exclusive(target: &Path) -> Result<Self> {
        Self::acquire(target, LockMode::Exclusive)
    }

    fn acquire(target: &Path, mode: LockMode) -> Result<Self> {
        let path = lock_path(target);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ConfigError::io(&path, e))?;

        match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        }
        .map_err(|e| ConfigError::io(&path, e))?;

        debug!(path = %path.display(), ?mode, "Acquired file lock");
        Ok(Self { file, path, mode })
    }

    /// Sentinel file holding the lock.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the lock was taken in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Deletes the sentinel, then releases the lock.
    pub fn release_and_remove(self) {
        remove_lock_file(&self.path);
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(path = %self.path.display(), error = %e, "Could not unlock lock file");
        }
    }
}

/// Sentinel path for `target`: the same file name with `.lock` appended.
pub fn lock_path(target: &Path) -> PathBuf {
    with_suffix(target, ".lock")
}

/// Appends `suffix` to the full file name of `path`.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Removes a sentinel file if present. Failure is logged, not returned.
pub(crate) fn remove_lock_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed lock file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove lock file"),
    }
}
