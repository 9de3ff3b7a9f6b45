//! Inspector configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (`--config` or GRAPHWIRE_CONFIG)
//! 3. Environment variables

use graphwire_protocol::{
    CodecContext, CURRENT_PROTOCOL_VERSION, OLDEST_SUPPORTED_PROTOCOL_VERSION,
};
use graphwire_record::{SerializerRegistry, BINARY_FORMAT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "GRAPHWIRE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Codec parameters used when decoding captured messages.
    pub codec: CodecConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from `path`, or from GRAPHWIRE_CONFIG when no path
    /// is given, then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.codec.apply_overrides(&lookup);
        self.logging.apply_overrides(&lookup);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.codec.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }
}

/// Codec configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Protocol version negotiated by the peer that produced the capture.
    pub protocol_version: i16,
    /// Record format the peer requested for record bodies.
    pub serializer: String,
    /// Record format used locally for cached record bytes.
    pub active_serializer: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            protocol_version: CURRENT_PROTOCOL_VERSION,
            serializer: BINARY_FORMAT.to_string(),
            active_serializer: BINARY_FORMAT.to_string(),
        }
    }
}

impl CodecConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(version) = lookup("GRAPHWIRE_PROTOCOL_VERSION") {
            if let Ok(v) = version.parse() {
                self.protocol_version = v;
            }
        }

        if let Some(name) = lookup("GRAPHWIRE_SERIALIZER") {
            if !name.is_empty() {
                self.serializer = name;
            }
        }

        if let Some(name) = lookup("GRAPHWIRE_ACTIVE_SERIALIZER") {
            if !name.is_empty() {
                self.active_serializer = name;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(OLDEST_SUPPORTED_PROTOCOL_VERSION..=CURRENT_PROTOCOL_VERSION)
            .contains(&self.protocol_version)
        {
            return Err(ConfigError::ValidationError(format!(
                "protocol version {} is outside the supported range {}..={}",
                self.protocol_version, OLDEST_SUPPORTED_PROTOCOL_VERSION, CURRENT_PROTOCOL_VERSION
            )));
        }

        let registry = SerializerRegistry::with_defaults();
        for name in [&self.serializer, &self.active_serializer] {
            if !registry.contains(name) {
                return Err(ConfigError::ValidationError(format!(
                    "unknown record serializer '{}' (available: {})",
                    name,
                    registry.names().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Builds the codec context with the default registries and the
    /// configured active format.
    pub fn context(&self) -> Result<CodecContext, ConfigError> {
        CodecContext::with_active(self.active_serializer.as_str())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, used when RUST_LOG is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("GRAPHWIRE_LOG") {
            if !level.is_empty() {
                self.level = level;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}
