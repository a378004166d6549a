use serde_json::Value;

use crate::{
    ConfigError, ConfigStore, Item,
    cli::{
        CliError, Command, CommandResult,
        formatting::format_json_value,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

/// Command for retrieving configuration values from the store.
///
/// Mappings print as indented JSON; scalars as JSON literals.
///
/// # Example Usage
///
/// ```bash
/// conftree --file app.toml config get db.port
/// conftree --file app.toml config get db
/// ```
pub struct GetCommand {
    config_store: ConfigStore,
}

impl GetCommand {
    /// Creates a new GetCommand reading from `config_store`.
    pub fn new(config_store: ConfigStore) -> Self {
        Self { config_store }
    }
}

impl Command for GetCommand {
    /// Retrieves and formats the value at the given path.
    ///
    /// # Errors
    ///
    /// * `CliError::InvalidArguments` - If no path argument is provided
    /// * `CliError::Config` - If the path is malformed or does not exist
    fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'get' command".to_string())
        })?;

        let item = self
            .config_store
            .get(path)?
            .ok_or_else(|| ConfigError::NotFound(path.clone()))?;

        let value = match item {
            Item::Value(value) => value,
            Item::Node(node) => Value::Object(node.flatten()?),
        };

        Ok(format_json_value(&value))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "get".to_string(),
            description: "Get a configuration value or section".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "path".to_string(),
                description: "Dotted configuration path (e.g., db.port)".to_string(),
                required: true,
                value_type: ArgType::Path,
            }],
            examples: vec![
                "conftree --file app.toml config get db.port".to_string(),
                "conftree --file app.toml config get db".to_string(),
            ],
        }
    }
}
