//! conftree - nested configuration trees kept in sync with a file.
//!
//! A [`ConfigStore`] owns a tree of mappings and scalar leaves and persists it
//! to JSON, TOML, YAML, INI or XML. Files can be encrypted at rest with a
//! password, guarded by a cross-process lock, and watched for external edits.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use conftree::{ConfigStore, StoreOptions};
//!
//! # fn main() -> conftree::Result<()> {
//! let store = ConfigStore::open(StoreOptions::new("app/settings.toml"))?;
//!
//! store.write("db.host", "localhost", false)?;
//! store.write("db.port", 5432, false)?;
//!
//! let port: u16 = store.read_as("db.port")?;
//! let db = store.node("db")?;
//! assert_eq!(db.keys()?, ["host", "port"]);
//!
//! store.close()?;
//! # let _ = port;
//! # Ok(())
//! # }
//! ```

/// Core error types and result aliases.
pub mod core;

/// File formats.
pub mod format;

/// Format codecs.
pub mod codec;

/// Password-based file encryption.
pub mod crypto;

/// Cross-process file locking.
pub mod lock;

/// Arena-backed configuration tree.
pub mod tree;

/// The configuration store.
pub mod store;

/// File change notifications.
pub mod watch;

/// Command-line interface.
pub mod cli;

/// Logging setup for the binary.
pub mod tracing_config;

/// Re-exported core types for convenience.
pub use crate::core::{ConfigError, Result};
pub use crypto::Password;
pub use format::Format;
pub use serde_json::{Map, Value};
pub use store::{ConfigNode, ConfigStore, Item, PersistState, StoreOptions, StoreStats};

/// Plain, ordered snapshot of a tree: the only form that is serialized or compared.
pub type Snapshot = Map<String, Value>;
