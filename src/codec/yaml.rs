use serde_json::Value;

use crate::{ConfigError, Result, Snapshot, format::Format};

use super::{Codec, json::kind};

/// YAML with a mapping at the root. An empty document is an empty tree.
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::new());
        }

        let value: Value =
            serde_yaml::from_slice(bytes).map_err(|e| ConfigError::codec(Format::Yaml, e))?;

        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Snapshot::new()),
            other => Err(ConfigError::codec(
                Format::Yaml,
                format!("document root must be a mapping, found {}", kind(&other)),
            )),
        }
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        serde_yaml::to_string(snapshot)
            .map(String::into_bytes)
            .map_err(|e| ConfigError::codec(Format::Yaml, e))
    }
}
