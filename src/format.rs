use std::{fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// On-disk syntax of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON document with an object at the root.
    Json,
    /// TOML document.
    #[default]
    Toml,
    /// YAML document with a mapping at the root.
    Yaml,
    /// INI sections with dotted names for nesting.
    Ini,
    /// XML document rooted at `<config>`.
    Xml,
}

impl Format {
    /// Every supported format.
    pub const ALL: [Format; 5] = [
        Format::Json,
        Format::Toml,
        Format::Yaml,
        Format::Ini,
        Format::Xml,
    ];

    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Toml => "toml",
            Format::Yaml => "yaml",
            Format::Ini => "ini",
            Format::Xml => "xml",
        }
    }

    /// Maps a file extension to a format, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            "yaml" | "yml" => Some(Format::Yaml),
            "ini" | "cfg" => Some(Format::Ini),
            "xml" => Some(Format::Xml),
            _ => None,
        }
    }

    /// Infers the format from the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| ConfigError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
