use crate::{
    ConfigStore,
    cli::{
        CliError, Command, CommandResult,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

/// Command for removing a value or section. Sections left empty are pruned.
pub struct DeleteCommand {
    config_store: ConfigStore,
}

impl DeleteCommand {
    /// Creates a new DeleteCommand acting on `config_store`.
    pub fn new(config_store: ConfigStore) -> Self {
        Self { config_store }
    }
}

impl Command for DeleteCommand {
    fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'delete' command".to_string())
        })?;

        self.config_store.delete(path)?;
        self.config_store.save()?;

        Ok(format!("Deleted '{path}'"))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "delete".to_string(),
            description: "Delete a configuration value or section".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "path".to_string(),
                description: "Dotted configuration path".to_string(),
                required: true,
                value_type: ArgType::Path,
            }],
            examples: vec!["conftree --file app.toml config delete db.password".to_string()],
        }
    }
}
