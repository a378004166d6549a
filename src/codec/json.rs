use serde_json::Value;

use crate::{ConfigError, Result, Snapshot, format::Format};

use super::Codec;

/// Pretty-printed JSON with an object at the root.
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        match serde_json::from_slice(bytes).map_err(|e| ConfigError::codec(Format::Json, e))? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Snapshot::new()),
            other => Err(ConfigError::codec(
                Format::Json,
                format!("document root must be an object, found {}", kind(&other)),
            )),
        }
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(snapshot).map_err(|e| ConfigError::codec(Format::Json, e))
    }
}

pub(super) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
