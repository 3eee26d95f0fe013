//! Configuration sources
//!
//! This module defines traits and implementations for loading configuration
//! from different sources.

use log::{debug, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::cli::CliArgs;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, ValueSource};

/// Configuration source trait
pub trait ConfigSource {
    /// Load one configuration layer from this source
    fn load(&self) -> Result<ConfigValues>;

    /// Get the source type
    fn source_type(&self) -> ValueSource;
}

/// Default configuration source
///
/// Contributes an empty layer; defaults are filled in when the merged layers
/// are resolved.
pub struct DefaultSource;

impl ConfigSource for DefaultSource {
    fn load(&self) -> Result<ConfigValues> {
        Ok(ConfigValues::default())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Default
    }
}

/// File configuration source (JSON)
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    /// Create a new file source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from file: {}", self.path.display());

        if !self.path.exists() {
            warn!("Configuration file not found: {}", self.path.display());
            return Ok(ConfigValues::default());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileReadError(self.path.clone(), e.to_string()))?;

        serde_json::from_str::<ConfigValues>(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", self.path.display(), e)))
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::File
    }
}

/// Environment variable configuration source
pub struct EnvSource {
    pub prefix: String,
}

impl EnvSource {
    /// Create a new environment source
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        let full_name = format!("{}{}", self.prefix, name);
        let value = env::var(&full_name).ok()?;
        debug!("Found environment variable {}", full_name);
        Some(value)
    }

    fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        match self.var(name) {
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ConfigError::InvalidValue(format!("{}{}", self.prefix, name), e.to_string())
            }),
            None => Ok(None),
        }
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        match self.var(name) {
            Some(raw) => parse_bool(&raw)
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidValue(
                    format!("{}{}", self.prefix, name),
                    format!("expected true/false, got '{}'", raw),
                )),
            None => Ok(None),
        }
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from environment variables with prefix: {}", self.prefix);

        let mut values = ConfigValues::default();

        values.host = self.var("HOST");
        values.port = self.parsed("PORT")?;
        values.auth.enabled = self.flag("AUTH_ENABLED")?;
        values.auth.username = self.var("AUTH_USERNAME");
        values.auth.password = self.var("AUTH_PASSWORD");
        values.ssl.cert = self.var("SSL_CERT").map(PathBuf::from);
        values.ssl.key = self.var("SSL_KEY").map(PathBuf::from);
        values.timeout = self.parsed("TIMEOUT")?;
        values.logging.level = self.var("LOG_LEVEL");
        values.logging.timestamp = self.flag("LOG_TIMESTAMP")?;
        values.upstream.insecure_tls = self.flag("UPSTREAM_INSECURE_TLS")?;
        values.upstream.connect_timeout = self.parsed("CONNECT_TIMEOUT")?;
        values.limits.max_connections = self.parsed("MAX_CONNECTIONS")?;
        values.limits.tunnel_idle_timeout = self.parsed("TUNNEL_IDLE_TIMEOUT")?;

        Ok(values)
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Environment
    }
}

/// Command line configuration source
pub struct CliSource {
    args: CliArgs,
}

impl CliSource {
    /// Create a new command line source from parsed arguments
    pub fn new(args: CliArgs) -> Self {
        Self { args }
    }
}

impl ConfigSource for CliSource {
    fn load(&self) -> Result<ConfigValues> {
        debug!("Loading configuration from command line arguments");
        Ok(self.args.to_values())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::CommandLine
    }
}

/// Lenient boolean parsing for environment values
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
