//! Command-line interface for configuration files.
//!
//! Provides a hierarchical command system on top of a [`ConfigStore`].
//! Commands are organized by category and generate their help text from
//! metadata.
//!
//! [`ConfigStore`]: crate::ConfigStore

mod commands;
pub mod formatting;
mod registry;
mod service;
mod types;

pub use commands::config::{DeleteCommand, ExportCommand, GetCommand, SetCommand, WatchCommand};
pub use registry::CommandRegistry;
pub use service::CliService;
pub use types::{ArgType, CliError, Command, CommandArg, CommandMetadata, CommandResult};

#[cfg(test)]
mod tests;
