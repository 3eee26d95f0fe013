//! Configuration errors
//!
//! This module defines error types for the configuration module.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Configuration error type
#[derive(Debug)]
pub enum ConfigError {
    /// File not found
    FileNotFound(PathBuf),

    /// Error reading file
    FileReadError(PathBuf, String),

    /// Error parsing configuration
    ParseError(String),

    /// Invalid value for configuration option
    InvalidValue(String, String),

    /// Missing required configuration value
    MissingRequiredValue(String),

    /// Invalid combination of configuration options
    InvalidCombination(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) =>
                write!(f, "File not found: {}", path.display()),

            ConfigError::FileReadError(path, err) =>
                write!(f, "Error reading configuration file {}: {}", path.display(), err),

            ConfigError::ParseError(msg) =>
                write!(f, "Error parsing configuration: {}", msg),

            ConfigError::InvalidValue(name, msg) =>
                write!(f, "Invalid value for '{}': {}", name, msg),

            ConfigError::MissingRequiredValue(name) =>
                write!(f, "Missing required configuration value: {}", name),

            ConfigError::InvalidCombination(msg) =>
                write!(f, "Invalid combination of configuration options: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

// Convert to crate's common error type
impl From<ConfigError> for crate::common::ProxyError {
    fn from(err: ConfigError) -> Self {
        crate::common::ProxyError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ProxyError;

    #[test]
    fn test_display() {
        let err = ConfigError::InvalidValue("port".to_string(), "must be greater than 0".to_string());
        assert_eq!(err.to_string(), "Invalid value for 'port': must be greater than 0");

        let err = ConfigError::MissingRequiredValue("auth.username".to_string());
        assert!(err.to_string().contains("auth.username"));
    }

    #[test]
    fn test_into_proxy_error() {
        let err: ProxyError = ConfigError::ParseError("trailing comma".to_string()).into();
        assert!(matches!(err, ProxyError::Config(msg) if msg.contains("trailing comma")));
    }
}
