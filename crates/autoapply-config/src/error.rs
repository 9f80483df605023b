//! Configuration errors.

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Referenced environment variable is not set.
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// A value is out of its allowed range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}
