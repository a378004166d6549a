//! Format codecs.
//!
//! Each codec turns raw file bytes into a [`Snapshot`] and back. Codecs never
//! see live tree nodes, only flattened snapshots.

mod ini;
mod json;
mod scalar;
mod toml;
mod xml;
mod yaml;

pub use self::{
    ini::IniCodec, json::JsonCodec, toml::TomlCodec, xml::XmlCodec, yaml::YamlCodec,
};

use crate::{Result, Snapshot, format::Format};

/// Conversion between file bytes and a configuration snapshot.
pub trait Codec: Send + Sync {
    /// Format handled by this codec.
    fn format(&self) -> Format;

    /// Parses `bytes` into a snapshot.
    ///
    /// # Errors
    /// Returns `ConfigError::Codec` when the bytes are not valid for this format
    /// or the document root is not a mapping.
    fn decode(&self, bytes: &[u8]) -> Result<Snapshot>;

    /// Serializes `snapshot` into file bytes.
    ///
    /// # Errors
    /// Returns `ConfigError::Codec` when the snapshot cannot be represented.
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>>;

    /// Whether the serialized form is binary rather than UTF-8 text.
    fn is_binary(&self) -> bool {
        false
    }
}

/// Returns the codec registered for `format`.
pub fn codec_for(format: Format) -> &'static dyn Codec {
    match format {
        Format::Json => &JsonCodec,
        Format::Toml => &TomlCodec,
        Format::Yaml => &YamlCodec,
        Format::Ini => &IniCodec,
        Format::Xml => &XmlCodec,
    }
}

fn utf8(format: Format, bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| crate::ConfigError::codec(format, e))
}
