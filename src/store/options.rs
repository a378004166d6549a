use std::path::{Path, PathBuf};

use crate::{Password, Result, Snapshot, format::Format, tree::path};

/// File name used when no path is given.
pub const DEFAULT_FILE_NAME: &str = "config";

/// Construction options for a [`ConfigStore`](super::ConfigStore).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Tree to seed a new file with. Ignored when an existing file is loaded.
    pub initial_data: Option<Snapshot>,
    /// Backing file. The format's extension is appended when missing.
    pub file_path: PathBuf,
    /// Explicit format; inferred from the extension when `None`.
    pub format: Option<Format>,
    /// Discard an existing file instead of loading it.
    pub replace: bool,
    /// Save after every mutation (possibly debounced).
    pub auto_save: bool,
    /// Encrypt the file at rest with this password.
    pub password: Option<Password>,
    /// Guard loads and saves with a cross-process lock.
    pub process_safe: bool,
    /// Trailing-edge delay before an automatic save. Zero saves synchronously.
    pub debounce_milliseconds: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial_data: None,
            file_path: PathBuf::from(DEFAULT_FILE_NAME),
            format: None,
            replace: false,
            auto_save: true,
            password: None,
            process_safe: false,
            debounce_milliseconds: 0,
        }
    }
}

impl StoreOptions {
    /// Options for the file at `path` with every other setting defaulted.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
            ..Self::default()
        }
    }

    /// Seeds a newly created file with `data`.
    pub fn initial_data(mut self, data: Snapshot) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Forces the file format.
    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Overwrites an existing file with the initial data.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Enables or disables saving after each mutation.
    pub fn auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// Encrypts the file with `password`.
    pub fn password(mut self, password: impl Into<Password>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enables cross-process locking.
    pub fn process_safe(mut self, process_safe: bool) -> Self {
        self.process_safe = process_safe;
        self
    }

    /// Sets the automatic save delay.
    pub fn debounce_milliseconds(mut self, milliseconds: u64) -> Self {
        self.debounce_milliseconds = milliseconds;
        self
    }

    /// Resolves the effective format and file path.
    pub(crate) fn resolve_target(&self) -> (PathBuf, Format) {
        resolve_target(&self.file_path, self.format, Format::default())
    }

    /// Checks that every key in the initial data is storable.
    pub(crate) fn validate(&self) -> Result<()> {
        match &self.initial_data {
            Some(data) => {
                super::reserved::check_top_level(data.keys())?;
                path::validate_snapshot(data)
            }
            None => Ok(()),
        }
    }
}

/// Picks a format (explicit, then extension, then `fallback`) and appends its
/// extension to a path that has none.
pub(crate) fn resolve_target(
    path: &Path,
    format: Option<Format>,
    fallback: Format,
) -> (PathBuf, Format) {
    let format = format
        .or_else(|| Format::from_path(path))
        .unwrap_or(fallback);

    let path = if path.extension().is_none() {
        path.with_extension(format.extension())
    } else {
        path.to_path_buf()
    };

    (path, format)
}
