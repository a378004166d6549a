//! Dot-separated paths and key validation.

use serde_json::Value;

use crate::{ConfigError, Result, Snapshot};

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Splits a dot-separated configuration path into its segments
///
/// # Arguments
/// * `path` - Dot-separated path (e.g., "server.port")
///
/// # Errors
/// * `ConfigError::InvalidPath` - If the path is empty or has an empty segment
pub fn split(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Err(ConfigError::InvalidPath("empty path".to_string()));
    }

    let parts: Vec<&str> = path.split(SEPARATOR).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(ConfigError::InvalidPath(format!(
            "'{path}' contains an empty segment"
        )));
    }

    Ok(parts)
}

/// Checks that a single key can be stored in a node
///
/// # Errors
/// * `ConfigError::InvalidPath` - If the key is empty or contains the separator
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ConfigError::InvalidPath("empty key".to_string()));
    }
    if key.contains(SEPARATOR) {
        return Err(ConfigError::InvalidPath(format!(
            "key '{key}' contains '{SEPARATOR}'; use a path write instead"
        )));
    }
    Ok(())
}

/// Checks every key of a snapshot, at any depth, with [`validate_key`].
///
/// # Errors
/// * `ConfigError::InvalidPath` - If any key is empty or contains the separator
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<()> {
    for (key, value) in snapshot {
        validate_key(key)?;
        if let Value::Object(child) = value {
            validate_snapshot(child)?;
        }
    }
    Ok(())
}

/// Checks a partial tree for a merge: top-level keys are paths, keys of
/// nested mappings must be plain keys.
///
/// # Errors
/// * `ConfigError::InvalidPath` - If any path or nested key is malformed
pub fn validate_partial(partial: &Snapshot) -> Result<()> {
    for (key, value) in partial {
        split(key)?;
        if let Value::Object(child) = value {
            validate_snapshot(child)?;
        }
    }
    Ok(())
}

/// Joins the first `len` segments back into a path, for error messages.
pub(crate) fn prefix(parts: &[&str], len: usize) -> String {
    parts[..len.min(parts.len())].join(".")
}

/// Joins a parent path and a key.
pub(crate) fn child(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{SEPARATOR}{key}")
    }
}
