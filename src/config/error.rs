//! Errors raised while loading, overriding or saving configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write configuration file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `THREADSAFE_SERIAL_*` override could not be parsed.
    #[error("Environment override {var}={value:?} is not a valid {expected}")]
    EnvOverride {
        var: String,
        value: String,
        expected: &'static str,
    },

    /// Sessions cannot open a device at 0 baud.
    #[error("serial.default_baud must be greater than zero")]
    ZeroBaudRate,

    /// Directory polling would spin.
    #[error("hotplug.poll_interval_ms must be greater than zero while hotplug is enabled")]
    ZeroPollInterval,
}

impl ConfigError {
    pub fn env_override(
        var: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::EnvOverride {
            var: var.into(),
            value: value.into(),
            expected,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_override_message() {
        let err = ConfigError::env_override(
            "THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD",
            "fast",
            "baud rate",
        );
        assert_eq!(
            err.to_string(),
            "Environment override THREADSAFE_SERIAL_SERIAL_DEFAULT_BAUD=\"fast\" \
             is not a valid baud rate"
        );
    }

    #[test]
    fn test_validation_messages_name_the_key() {
        assert!(ConfigError::ZeroBaudRate
            .to_string()
            .starts_with("serial.default_baud"));
        assert!(ConfigError::ZeroPollInterval
            .to_string()
            .starts_with("hotplug.poll_interval_ms"));
    }
}
