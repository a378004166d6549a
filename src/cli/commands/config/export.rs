use crate::{
    ConfigStore, Format,
    cli::{
        CliError, Command, CommandResult,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

/// Command for writing the configuration to another file, optionally in
/// another format.
pub struct ExportCommand {
    config_store: ConfigStore,
}

impl ExportCommand {
    /// Creates a new ExportCommand reading from `config_store`.
    pub fn new(config_store: ConfigStore) -> Self {
        Self { config_store }
    }
}

impl Command for ExportCommand {
    /// # Errors
    ///
    /// * `CliError::InvalidArguments` - If no target is given
    /// * `CliError::Config` - If the format is unknown or the export fails
    fn execute(&self, args: &[String]) -> CommandResult {
        let target = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'export' command".to_string())
        })?;

        let format = args
            .get(1)
            .map(|name| name.parse::<Format>())
            .transpose()?;

        let written = self.config_store.export_to(target, format)?;

        Ok(format!("Exported configuration to '{}'", written.display()))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "export".to_string(),
            description: "Export the configuration to another file".to_string(),
            category: "config".to_string(),
            args: vec![
                CommandArg {
                    name: "path".to_string(),
                    description: "Target file; the format's extension is added when missing"
                        .to_string(),
                    required: true,
                    value_type: ArgType::File,
                },
                CommandArg {
                    name: "format".to_string(),
                    description: "json, toml, yaml, ini or xml (default: from extension)"
                        .to_string(),
                    required: false,
                    value_type: ArgType::Format,
                },
            ],
            examples: vec![
                "conftree --file app.toml config export backup.json".to_string(),
                "conftree --file app.toml config export backup yaml".to_string(),
            ],
        }
    }
}
