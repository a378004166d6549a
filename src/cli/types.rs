use thiserror::Error;

use crate::ConfigError;

/// Errors that can occur during CLI command execution.
///
/// Each variant carries enough context for the user to see what went wrong;
/// store failures keep the underlying error as the source.
#[derive(Error, Debug)]
pub enum CliError {
    /// A command or category was not found in the registry.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Invalid arguments were provided to a command.
    ///
    /// Returned when argument validation fails, such as missing required
    /// arguments, too many arguments, or values that cannot be parsed.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The configuration store rejected the operation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Type alias for command execution results.
///
/// All CLI commands return either the text to print or a `CliError`.
pub type CommandResult = Result<String, CliError>;

/// Specification for a single command argument.
///
/// Used for help generation and argument count validation.
#[derive(Debug, Clone)]
pub struct CommandArg {
    /// The name of the argument (e.g., "path", "value", "format").
    pub name: String,

    /// Human-readable description of what this argument does.
    pub description: String,

    /// Whether this argument is required for command execution.
    pub required: bool,

    /// The expected type of this argument for help display.
    pub value_type: ArgType,
}

/// Type classification for command arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// A general string value.
    String,

    /// A configuration value whose type is detected from its text.
    Value,

    /// A dotted configuration path.
    Path,

    /// A file system path.
    File,

    /// One of the supported file formats.
    Format,
}

/// Complete metadata for a CLI command.
///
/// The single source of truth for a command's identity, arguments and usage
/// examples. The registry validates argument counts against it.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// The command name (e.g., "get", "set", "watch").
    pub name: String,

    /// Brief description of what this command does.
    pub description: String,

    /// Specification of all arguments this command accepts.
    pub args: Vec<CommandArg>,

    /// Example usage strings to show in help text.
    pub examples: Vec<String>,

    /// Category this command belongs to (e.g., "config").
    pub category: String,
}

/// Trait defining the interface for all CLI commands.
///
/// Commands receive their dependencies through their constructors.
pub trait Command: Send + Sync {
    /// Executes the command with the provided arguments.
    ///
    /// The registry has already checked the argument count against the
    /// command's metadata; the command validates the values themselves.
    ///
    /// # Errors
    ///
    /// Returns `CliError` for invalid argument values or store failures.
    fn execute(&self, args: &[String]) -> CommandResult;

    /// Returns the complete metadata for this command.
    fn metadata(&self) -> CommandMetadata;
}
