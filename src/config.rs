//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! identifier_pattern = "^[a-zA-Z][a-zA-Z0-9_]*$"
//! default_checksum_algorithm = "crc16-modbus"
//! check_references = true
//! ```

use crate::checksum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_IDENTIFIER_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9_]*$";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid identifier_pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("unknown checksum algorithm `{0}`")]
    UnknownAlgorithm(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Names accepted by rename.
    pub identifier_pattern: String,
    /// Algorithm seeded into new `Checksum` fields.
    pub default_checksum_algorithm: String,
    /// Report references to fields that do not exist.
    pub check_references: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            identifier_pattern: DEFAULT_IDENTIFIER_PATTERN.to_string(),
            default_checksum_algorithm: checksum::DEFAULT_ALGORITHM.to_string(),
            check_references: true,
        }
    }
}

impl EngineConfig {
    /// Parse and check a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.identifier_regex()?;
        if checksum::find(&config.default_checksum_algorithm).is_none() {
            return Err(ConfigError::UnknownAlgorithm(
                config.default_checksum_algorithm,
            ));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn identifier_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.identifier_pattern)?)
    }
}
