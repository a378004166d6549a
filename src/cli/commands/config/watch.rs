use std::{thread, time::Duration};

use serde_json::Value;
use tracing::debug;

use crate::{
    ConfigStore,
    cli::{
        CliError, Command, CommandResult,
        formatting::format_json_value,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Command that follows the file and prints the configuration whenever an
/// external edit changes it.
pub struct WatchCommand {
    config_store: ConfigStore,
}

impl WatchCommand {
    /// Creates a new WatchCommand following `config_store`'s file.
    pub fn new(config_store: ConfigStore) -> Self {
        Self { config_store }
    }
}

impl Command for WatchCommand {
    fn execute(&self, args: &[String]) -> CommandResult {
        let path = args.first();

        self.config_store.enable_watch()?;
        println!(
            "Watching '{}' for changes...",
            self.config_store.path().display()
        );
        println!("Press Ctrl+C to stop");

        let mut last = self.current(path)?;
        loop {
            thread::sleep(POLL_INTERVAL);

            let current = match self.current(path) {
                Ok(current) => current,
                Err(e) => {
                    debug!(error = %e, "Watched value not readable");
                    continue;
                }
            };
            if current != last {
                println!("{}", format_json_value(&current));
                last = current;
            }
        }
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "watch".to_string(),
            description: "Print the configuration whenever the file changes".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "path".to_string(),
                description: "Only print this dotted path".to_string(),
                required: false,
                value_type: ArgType::Path,
            }],
            examples: vec![
                "conftree --file app.toml config watch".to_string(),
                "conftree --file app.toml config watch db.port".to_string(),
            ],
        }
    }
}

impl WatchCommand {
    fn current(&self, path: Option<&String>) -> Result<Value, CliError> {
        match path {
            Some(path) => Ok(self.config_store.read(path, Value::Null)?),
            None => Ok(Value::Object(self.config_store.to_dict()?)),
        }
    }
}
