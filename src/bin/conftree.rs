//! conftree - inspect and edit configuration files from the command line.

use std::{error::Error, path::PathBuf, process};

use clap::Parser;
use conftree::{
    ConfigStore, Format, Password, StoreOptions,
    cli::{CliService, formatting::format_error},
    tracing_config,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "conftree")]
#[command(about = "Read and edit nested configuration files")]
struct Cli {
    /// Configuration file; the format's extension is added when missing
    #[arg(short, long, default_value = conftree::store::DEFAULT_FILE_NAME)]
    file: PathBuf,

    /// File format (json, toml, yaml, ini, xml); inferred from the extension by default
    #[arg(long)]
    format: Option<Format>,

    /// Password for an encrypted file
    #[arg(long, env = "CONFTREE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Guard reads and writes with a cross-process lock file
    #[arg(long)]
    process_safe: bool,

    /// Command category, command name and command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    tracing_config::init()?;

    if let Err(e) = run(cli) {
        eprintln!("{}", format_error(&e.to_string()));
        process::exit(1);
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut options = StoreOptions::new(cli.file).process_safe(cli.process_safe);
    if let Some(format) = cli.format {
        options = options.format(format);
    }
    if let Some(password) = cli.password {
        options = options.password(Password::new(password));
    }

    let store = ConfigStore::open(options)?;
    debug!(path = %store.path().display(), "Opened configuration");
    let cli_service = CliService::new(store.clone());

    let category = cli.command.first().map(String::as_str).unwrap_or("help");
    if category == "help" {
        println!("{}", cli_service.help("conftree"));
        return Ok(());
    }

    let command = cli.command.get(1).map(String::as_str).unwrap_or("");
    let command_args = cli.command.get(2..).unwrap_or(&[]);

    let output = cli_service.execute_command(category, command, command_args)?;
    if !output.trim().is_empty() {
        println!("{output}");
    }

    store.close()?;
    Ok(())
}
