use serde_json::{Map, Number, Value};

use crate::{ConfigError, Result, Snapshot, format::Format};

use super::{Codec, utf8};

/// TOML document. Null leaves are omitted because TOML has no null, and
/// datetimes load as strings.
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn format(&self) -> Format {
        Format::Toml
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        let table: ::toml::Table = ::toml::from_str(utf8(Format::Toml, bytes)?)
            .map_err(|e| ConfigError::codec(Format::Toml, e))?;

        Ok(table
            .into_iter()
            .map(|(key, value)| (key, from_toml(value)))
            .collect())
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let table = to_toml_table(snapshot)?;

        ::toml::to_string_pretty(&table)
            .map(String::into_bytes)
            .map_err(|e| ConfigError::codec(Format::Toml, e))
    }
}

fn from_toml(value: ::toml::Value) -> Value {
    use ::toml::Value as Toml;

    match value {
        Toml::String(s) => Value::String(s),
        Toml::Integer(i) => Value::from(i),
        Toml::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        Toml::Boolean(b) => Value::Bool(b),
        Toml::Datetime(dt) => Value::String(dt.to_string()),
        Toml::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        Toml::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, from_toml(value)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

fn to_toml_table(map: &Snapshot) -> Result<::toml::Table> {
    let mut table = ::toml::Table::new();

    for (key, value) in map {
        if let Some(converted) = to_toml(value)? {
            table.insert(key.clone(), converted);
        }
    }

    Ok(table)
}

fn to_toml(value: &Value) -> Result<Option<::toml::Value>> {
    use ::toml::Value as Toml;

    let converted = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => Toml::Boolean(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Toml::Integer(i),
            (None, Some(f)) if n.is_f64() => Toml::Float(f),
            _ => {
                return Err(ConfigError::codec(
                    Format::Toml,
                    format!("integer {n} does not fit in a TOML integer"),
                ));
            }
        },
        Value::String(s) => Toml::String(s.clone()),
        Value::Array(items) => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                if let Some(item) = to_toml(item)? {
                    converted.push(item);
                }
            }
            Toml::Array(converted)
        }
        Value::Object(map) => Toml::Table(to_toml_table(map)?),
    };

    Ok(Some(converted))
}
