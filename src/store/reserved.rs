//! Top-level keys that collide with store operation names.

use crate::{ConfigError, Result, tree::path::SEPARATOR};

/// Operation names that cannot be used as top-level keys.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "batch",
    "close",
    "contains",
    "delete",
    "delete_all",
    "disable_watch",
    "enable_watch",
    "export_to",
    "format",
    "get",
    "is_auto_save",
    "is_dirty",
    "is_encrypted",
    "is_watching",
    "node",
    "path",
    "persist_state",
    "read",
    "read_as",
    "reload",
    "root",
    "save",
    "set_auto_save",
    "set_data",
    "stats",
    "to_dict",
    "to_json",
    "update",
    "write",
];

/// Whether `key` is a reserved top-level name.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYWORDS.binary_search(&key).is_ok()
}

/// Fails if `key` is reserved.
pub(crate) fn check(key: &str) -> Result<()> {
    if is_reserved(key) {
        return Err(ConfigError::ReservedKeyword(key.to_string()));
    }
    Ok(())
}

/// Fails if the first segment of a dotted path is reserved.
pub(crate) fn check_path(path: &str) -> Result<()> {
    check(path.split(SEPARATOR).next().unwrap_or(path))
}

/// Fails if any top-level key (or first path segment of a dotted key) is reserved.
pub(crate) fn check_top_level<'a>(keys: impl IntoIterator<Item = &'a String>) -> Result<()> {
    keys.into_iter().try_for_each(|key| check_path(key))
}
