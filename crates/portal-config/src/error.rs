//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The file extension doesn't name a supported format
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The file content did not parse
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        /// Format being parsed
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// An environment override had an invalid value
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Environment variable name
        var: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// The loaded configuration failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl ConfigError {
    pub(crate) fn yaml(e: &serde_yaml::Error) -> Self {
        Self::Parse {
            format: "YAML",
            message: e.to_string(),
        }
    }

    pub(crate) fn toml(e: &toml::de::Error) -> Self {
        Self::Parse {
            format: "TOML",
            message: e.to_string(),
        }
    }
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
