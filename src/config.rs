//! # Configuration Management
//!
//! Configuration for session state persistence and its logging.
//!
//! The wire format is fixed and never configurable. What can be tuned is how
//! defensive `load` is about oversized input, whether outcomes are counted,
//! and how logs are emitted.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`

use crate::error::{Result, SessionError};
use crate::session::serialize::SERIALIZED_SIZE;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Default upper bound on a container accepted by `load`
pub const DEFAULT_MAX_BLOB_SIZE: usize = 4096;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionStateConfig {
    /// Save / load settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionStateConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| SessionError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| SessionError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| SessionError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("SESSION_STATE_MAX_BLOB_SIZE") {
            config.persistence.max_blob_size = size.parse::<usize>().map_err(|e| {
                SessionError::ConfigError(format!("Invalid SESSION_STATE_MAX_BLOB_SIZE: {e}"))
            })?;
        }

        if let Ok(enabled) = std::env::var("SESSION_STATE_METRICS_ENABLED") {
            config.persistence.metrics_enabled = enabled.parse::<bool>().map_err(|e| {
                SessionError::ConfigError(format!("Invalid SESSION_STATE_METRICS_ENABLED: {e}"))
            })?;
        }

        if let Ok(level) = std::env::var("SESSION_STATE_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                SessionError::ConfigError(format!("Invalid SESSION_STATE_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SessionError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        self.persistence.validate()
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

fn into_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SessionError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

/// Save / load settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Largest container (header plus declared payload) `load` will examine
    pub max_blob_size: usize,

    /// Whether save / load outcomes are counted in the global metrics
    pub metrics_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            metrics_enabled: true,
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_blob_size < SERIALIZED_SIZE {
            errors.push(format!(
                "Max blob size too small: {} (minimum: {} bytes)",
                self.max_blob_size, SERIALIZED_SIZE
            ));
        } else if self.max_blob_size > 1024 * 1024 {
            errors.push(format!(
                "Max blob size too large: {} bytes (maximum: 1 MB)",
                self.max_blob_size
            ));
        }

        errors
    }

    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include the event target (module path)
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json_format: false,
            show_target: false,
        }
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
