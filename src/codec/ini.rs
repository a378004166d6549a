use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::{ConfigError, Result, Snapshot, format::Format};

use super::{
    Codec,
    scalar::{infer, render},
    utf8,
};

/// INI with dotted section names for nesting.
///
/// Top-level leaves are written before the first section. Every mapping gets
/// its own `[a.b]` header, so empty mappings survive a round trip.
pub struct IniCodec;

impl Codec for IniCodec {
    fn format(&self) -> Format {
        Format::Ini
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        let text = utf8(Format::Ini, bytes)?;
        let mut root = Snapshot::new();
        let mut section: Vec<String> = Vec::new();

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[') {
                let name = name
                    .strip_suffix(']')
                    .ok_or_else(|| syntax(number, "unterminated section header"))?;
                section = name.split('.').map(|s| s.trim().to_string()).collect();
                if section.iter().any(String::is_empty) {
                    return Err(syntax(number, format!("invalid section name '{name}'")));
                }
                section_map(&mut root, &section, number)?;
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| syntax(number, "expected 'key = value'"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(syntax(number, "empty key"));
            }

            section_map(&mut root, &section, number)?.insert(key.to_string(), infer(value.trim()));
        }

        Ok(root)
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let mut out = String::new();
        write_leaves(&mut out, snapshot)?;
        write_sections(&mut out, "", snapshot)?;
        Ok(out.into_bytes())
    }
}

fn section_map<'a>(
    root: &'a mut Snapshot,
    section: &[String],
    line: usize,
) -> Result<&'a mut Map<String, Value>> {
    let mut current = root;
    for name in section {
        let entry = current
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(syntax(
                    line,
                    format!("section '{}' collides with a value", section.join(".")),
                ));
            }
        };
    }
    Ok(current)
}

fn write_leaves(out: &mut String, map: &Map<String, Value>) -> Result<()> {
    for (key, value) in map {
        if value.is_object() {
            continue;
        }
        check_key(key)?;
        let _ = writeln!(out, "{key} = {}", ini_value(value));
    }
    Ok(())
}

fn ini_value(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains(['\n', '\r']) => value.to_string(),
        other => render(other),
    }
}

fn write_sections(out: &mut String, prefix: &str, map: &Map<String, Value>) -> Result<()> {
    for (key, value) in map {
        let Value::Object(child) = value else {
            continue;
        };
        check_key(key)?;
        if key.contains(['.', ']']) {
            return Err(ConfigError::codec(
                Format::Ini,
                format!("section name '{key}' cannot contain '.' or ']'"),
            ));
        }

        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "[{name}]");
        write_leaves(out, child)?;
        write_sections(out, &name, child)?;
    }
    Ok(())
}

fn check_key(key: &str) -> Result<()> {
    let unrepresentable = key.trim() != key
        || key.is_empty()
        || key.contains(['=', '\n', '\r'])
        || key.starts_with(['[', ';', '#']);

    if unrepresentable {
        return Err(ConfigError::codec(
            Format::Ini,
            format!("key '{key}' cannot be represented in INI"),
        ));
    }
    Ok(())
}

fn syntax(line: usize, message: impl std::fmt::Display) -> ConfigError {
    ConfigError::codec(Format::Ini, format!("line {}: {message}", line + 1))
}
