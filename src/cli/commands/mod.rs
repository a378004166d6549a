/// Configuration file commands.
pub mod config;
