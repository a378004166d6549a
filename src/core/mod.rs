use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::format::Format;

/// Errors produced by the configuration store and its collaborators.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file on disk is encrypted but no password was configured.
    #[error("'{path}' is encrypted and no password was provided")]
    MissingPassword {
        /// Encrypted file
        path: PathBuf,
    },

    /// Authenticated decryption failed: wrong password or tampered file.
    #[error("integrity check failed for '{path}': wrong password or corrupted data")]
    IntegrityFailure {
        /// File that failed verification
        path: PathBuf,
    },

    /// The requested file format is not one of the supported codecs.
    #[error("unsupported format '{0}' (supported: json, toml, yaml, ini, xml)")]
    UnsupportedFormat(String),

    /// A path segment holds a value of the wrong class and overwrite was not requested.
    #[error("path conflict at '{path}': {reason}")]
    PathConflict {
        /// Dotted path where the conflict was detected
        path: String,
        /// Why the write was refused
        reason: String,
    },

    /// The path or key does not exist.
    #[error("config path not found: {0}")]
    NotFound(String),

    /// The path string is malformed (empty, or contains an empty segment).
    #[error("invalid config path: {0}")]
    InvalidPath(String),

    /// The top-level key collides with a store operation name.
    #[error("'{0}' is a reserved name and cannot be used as a top-level key")]
    ReservedKeyword(String),

    /// Filesystem operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path the operation was acting on
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A codec could not parse or produce its format.
    #[error("failed to process {format} data: {details}")]
    Codec {
        /// Format being decoded or encoded
        format: Format,
        /// Codec error details
        details: String,
    },

    /// Typed extraction could not deserialize the stored value.
    #[error("type mismatch at '{path}': expected {expected_type}")]
    TypeMismatch {
        /// Path of the value
        path: String,
        /// Rust type that was requested
        expected_type: &'static str,
    },

    /// Key derivation or encryption could not be performed.
    #[error("encryption failed: {0}")]
    Crypto(String),

    /// The store mutex was poisoned by a panicking thread.
    #[error("configuration store lock poisoned")]
    LockPoisoned,

    /// A node handle outlived the store that owns its tree.
    #[error("configuration store has been dropped")]
    StoreDropped,

    /// The file watcher could not be started or stopped.
    #[error("file watcher error for '{path}': {details}")]
    Watch {
        /// Watched path
        path: PathBuf,
        /// Watcher error details
        details: String,
    },
}

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a codec error for `format`.
    pub fn codec(format: Format, error: impl fmt::Display) -> Self {
        ConfigError::Codec {
            format,
            details: error.to_string(),
        }
    }

    /// Creates a path conflict error.
    pub fn conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::PathConflict {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
