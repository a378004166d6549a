//! Unit tests for CLI module
//!
//! Tests command registry, value parsing and formatting against a store in a
//! temporary directory.

use std::fs;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::{
    ConfigError, ConfigStore, StoreOptions,
    cli::{
        CliError, CliService, CommandRegistry, SetCommand,
        formatting::{format_help, format_json_value},
    },
};

fn service(dir: &TempDir) -> (CliService, ConfigStore) {
    let store = ConfigStore::open(StoreOptions::new(dir.path().join("app.json"))).unwrap();
    (CliService::new(store.clone()), store)
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn format_json_value_scalars() {
    assert_eq!(format_json_value(&json!("hello world")), "\"hello world\"");
    assert_eq!(format_json_value(&json!(42)), "42");
    assert_eq!(format_json_value(&json!(-2.5)), "-2.5");
    assert_eq!(format_json_value(&json!(true)), "true");
    assert_eq!(format_json_value(&Value::Null), "null");
}

#[test]
fn format_json_value_nested() {
    let formatted = format_json_value(&json!({"db": {"port": 1}}));

    assert!(formatted.contains('\n'));
    assert_eq!(
        serde_json::from_str::<Value>(&formatted).unwrap(),
        json!({"db": {"port": 1}})
    );
}

#[test]
fn parse_config_value_detects_types() {
    assert_eq!(SetCommand::parse_config_value("true"), json!(true));
    assert_eq!(SetCommand::parse_config_value("null"), Value::Null);
    assert_eq!(SetCommand::parse_config_value("5432"), json!(5432));
    assert_eq!(SetCommand::parse_config_value("0.5"), json!(0.5));
    assert_eq!(SetCommand::parse_config_value("[1, 2]"), json!([1, 2]));
    assert_eq!(SetCommand::parse_config_value("{\"a\": 1}"), json!({"a": 1}));
    assert_eq!(SetCommand::parse_config_value("\"42\""), json!("42"));
    assert_eq!(SetCommand::parse_config_value("inf"), json!("inf"));
    assert_eq!(SetCommand::parse_config_value("[oops"), json!("[oops"));
    assert_eq!(SetCommand::parse_config_value("localhost"), json!("localhost"));
}

#[test]
fn command_registry_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(StoreOptions::new(dir.path().join("app.json"))).unwrap();
    let registry = CommandRegistry::new(store);

    assert!(registry.list_commands().is_empty());
}

#[test]
fn service_registers_config_commands() {
    let dir = TempDir::new().unwrap();
    let (service, _store) = service(&dir);

    assert_eq!(
        service.list_all(),
        vec![(
            "config".to_string(),
            args(&["delete", "export", "get", "set", "watch"])
        )]
    );
}

#[test]
fn set_get_and_delete_round_trip() {
    let dir = TempDir::new().unwrap();
    let (service, store) = service(&dir);

    service
        .execute_command("config", "set", &args(&["db.port", "5432"]))
        .unwrap();
    assert_eq!(
        service
            .execute_command("config", "get", &args(&["db.port"]))
            .unwrap(),
        "5432"
    );
    assert_eq!(store.read("db.port", Value::Null).unwrap(), json!(5432));

    service
        .execute_command("config", "delete", &args(&["db.port"]))
        .unwrap();
    assert!(!store.contains("db").unwrap());
}

#[test]
fn get_missing_path_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let (service, _store) = service(&dir);

    let result = service.execute_command("config", "get", &args(&["missing"]));

    assert!(matches!(
        result,
        Err(CliError::Config(ConfigError::NotFound(_)))
    ));
}

#[test]
fn export_honours_explicit_format() {
    let dir = TempDir::new().unwrap();
    let (service, store) = service(&dir);
    store.write("name", "demo", false).unwrap();

    let target = dir.path().join("copy");
    service
        .execute_command(
            "config",
            "export",
            &args(&[target.to_str().unwrap(), "yaml"]),
        )
        .unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("copy.yaml")).unwrap(),
        "name: demo\n"
    );
}

#[test]
fn export_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    let (service, _store) = service(&dir);

    let result = service.execute_command("config", "export", &args(&["out", "csv"]));

    assert!(matches!(
        result,
        Err(CliError::Config(ConfigError::UnsupportedFormat(_)))
    ));
}

#[test]
fn unknown_commands_and_bad_arity_are_reported() {
    let dir = TempDir::new().unwrap();
    let (service, _store) = service(&dir);

    assert!(matches!(
        service.execute_command("system", "status", &[]),
        Err(CliError::CommandNotFound(_))
    ));
    assert!(matches!(
        service.execute_command("config", "missing", &[]),
        Err(CliError::CommandNotFound(_))
    ));
    assert!(matches!(
        service.execute_command("config", "get", &[]),
        Err(CliError::InvalidArguments(_))
    ));
    assert!(matches!(
        service.execute_command("config", "set", &args(&["a", "1", "extra"])),
        Err(CliError::InvalidArguments(_))
    ));
}

#[test]
fn help_lists_every_command() {
    let dir = TempDir::new().unwrap();
    let (service, _store) = service(&dir);

    let help = service.help("conftree");

    for name in ["get", "set", "delete", "export", "watch", "[format]", "<path>"] {
        assert!(help.contains(name), "help is missing {name}");
    }
}

#[test]
fn help_without_commands_still_shows_usage() {
    let help = format_help("conftree", &[]);

    assert!(help.contains("Usage:"));
    assert!(help.contains("conftree --file <path>"));
}
