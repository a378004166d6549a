//! Formatting utilities for CLI output.
//!
//! Provides consistent formatting for configuration values and styled help
//! text for CLI commands.

use serde_json::Value;

use super::types::CommandMetadata;

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";

    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
    /// Blue color
    pub const BLUE: &'static str = "\x1b[34m";
    /// Cyan color
    pub const CYAN: &'static str = "\x1b[36m";
}

/// Formats section headers with styling
pub fn format_header(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::CYAN, text, Colors::RESET)
}

/// Formats subheaders with styling
pub fn format_subheader(text: &str) -> String {
    format!(
        "{}{}{}{}",
        Colors::BOLD,
        Colors::YELLOW,
        text,
        Colors::RESET
    )
}

/// Formats command names with styling
pub fn format_command(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::GREEN, text, Colors::RESET)
}

/// Formats category names with styling
pub fn format_category(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::BLUE, text, Colors::RESET)
}

/// Formats descriptions with muted styling
pub fn format_description(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Formats a configuration value for human-readable CLI output.
///
/// Scalars print as JSON literals. Mappings and arrays print as indented
/// JSON so nested sections stay readable.
///
/// # Examples
///
/// ```
/// use conftree::cli::formatting::format_json_value;
/// use serde_json::json;
///
/// assert_eq!(format_json_value(&json!("hello")), "\"hello\"");
/// assert_eq!(format_json_value(&json!(42)), "42");
/// ```
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        scalar => scalar.to_string(),
    }
}

/// Renders the help screen for every registered command.
///
/// `commands` is grouped by category, as returned by
/// [`CommandRegistry::list_metadata`](super::CommandRegistry::list_metadata).
pub fn format_help(program: &str, commands: &[(String, Vec<CommandMetadata>)]) -> String {
    let mut out = format!(
        "{}\n\n{}\n  {program} --file <path> <category> <command> [args...]\n",
        format_header("conftree - nested configuration files"),
        format_subheader("Usage:"),
    );

    for (category, metadata) in commands {
        out.push_str(&format!("\n{}\n", format_category(category)));

        for command in metadata {
            let args: String = command
                .args
                .iter()
                .map(|arg| {
                    if arg.required {
                        format!(" <{}>", arg.name)
                    } else {
                        format!(" [{}]", arg.name)
                    }
                })
                .collect();

            out.push_str(&format!(
                "  {}{args}  {}\n",
                format_command(&command.name),
                format_description(&command.description)
            ));
            for example in &command.examples {
                out.push_str(&format!("      {}\n", format_description(example)));
            }
        }
    }

    out
}
