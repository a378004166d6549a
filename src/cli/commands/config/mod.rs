//! Configuration file commands.
mod delete;
mod export;
mod get;
mod set;
mod watch;

pub use delete::DeleteCommand;
pub use export::ExportCommand;
pub use get::GetCommand;
pub use set::SetCommand;
pub use watch::WatchCommand;

use crate::{ConfigStore, cli::CommandRegistry};

/// Registers all configuration-related commands with the command registry.
///
/// Every command lands in the "config" category and shares `config_store`.
pub fn register_commands(registry: &mut CommandRegistry, config_store: ConfigStore) {
    const CATEGORY_NAME: &str = "config";

    registry.register_command(
        CATEGORY_NAME,
        Box::new(GetCommand::new(config_store.clone())),
    );

    registry.register_command(
        CATEGORY_NAME,
        Box::new(SetCommand::new(config_store.clone())),
    );

    registry.register_command(
        CATEGORY_NAME,
        Box::new(DeleteCommand::new(config_store.clone())),
    );

    registry.register_command(
        CATEGORY_NAME,
        Box::new(ExportCommand::new(config_store.clone())),
    );

    registry.register_command(CATEGORY_NAME, Box::new(WatchCommand::new(config_store)));
}
