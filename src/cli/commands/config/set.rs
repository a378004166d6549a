use serde_json::Value;

use crate::{
    ConfigStore,
    cli::{
        CliError, Command, CommandResult,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

/// Command for writing a configuration value.
///
/// The value's type is detected from its text; the write overwrites a
/// mapping or value of the other kind.
pub struct SetCommand {
    config_store: ConfigStore,
}

impl SetCommand {
    /// Creates a new SetCommand writing to `config_store`.
    pub fn new(config_store: ConfigStore) -> Self {
        Self { config_store }
    }

    /// Detects the value's type: bool, integer, float, JSON array/object/string,
    /// then plain string.
    pub(crate) fn parse_config_value(value_str: &str) -> Value {
        if let Ok(b) = value_str.parse::<bool>() {
            return Value::Bool(b);
        }

        if value_str == "null" {
            return Value::Null;
        }

        if let Ok(i) = value_str.parse::<i64>() {
            return Value::from(i);
        }

        if let Ok(f) = value_str.parse::<f64>() {
            if f.is_finite() {
                return Value::from(f);
            }
        }

        if value_str.starts_with(['[', '{', '"']) {
            if let Ok(value) = serde_json::from_str(value_str) {
                return value;
            }
        }

        Value::String(value_str.to_string())
    }
}

impl Command for SetCommand {
    fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first().ok_or_else(|| {
            CliError::InvalidArguments("Expected <path> argument for 'set' command".to_string())
        })?;

        let value_str = args.get(1).ok_or_else(|| {
            CliError::InvalidArguments("Expected <value> argument for 'set' command".to_string())
        })?;
        let value = Self::parse_config_value(value_str);

        self.config_store.write(path, value, true)?;
        self.config_store.save()?;

        Ok(format!("Set new value '{value_str}' at path '{path}'"))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "set".to_string(),
            description: "Set a configuration value".to_string(),
            category: "config".to_string(),
            args: vec![
                CommandArg {
                    name: "path".to_string(),
                    description: "Dotted configuration path".to_string(),
                    required: true,
                    value_type: ArgType::Path,
                },
                CommandArg {
                    name: "value".to_string(),
                    description: "New value (auto-detected type)".to_string(),
                    required: true,
                    value_type: ArgType::Value,
                },
            ],
            examples: vec![
                "conftree --file app.toml config set db.port 5432".to_string(),
                "conftree --file app.toml config set features '[\"a\", \"b\"]'".to_string(),
            ],
        }
    }
}
