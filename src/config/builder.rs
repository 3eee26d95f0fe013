//! Configuration builder
//!
//! This module provides a builder pattern for constructing configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use log::debug;

use crate::config::cli::CliArgs;
use crate::config::defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
use crate::config::error::Result;
use crate::config::source::{CliSource, ConfigSource, DefaultSource, EnvSource, FileSource};
use crate::config::types::{ConfigValues, ProxyConfig};
use crate::config::validator::validate_config;

/// Configuration builder
///
/// Provides a fluent API for building configuration from multiple sources.
/// Sources are applied in the order they were added, later ones winning.
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    config_file: Option<PathBuf>,
    validate: bool,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            config_file: None,
            validate: true,
        }
    }

    /// Add default source
    pub fn with_defaults(mut self) -> Self {
        debug!("Adding default configuration source");
        self.sources.push(Box::new(DefaultSource));
        self
    }

    /// Add file source
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        debug!("Adding file configuration source: {}", path.display());
        if path.exists() {
            self.config_file = Some(path.to_path_buf());
        }
        self.sources.push(Box::new(FileSource::new(path)));
        self
    }

    /// Add environment source
    pub fn with_env(mut self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.sources.push(Box::new(EnvSource::new(prefix)));
        self
    }

    /// Add command line source
    pub fn with_cli(mut self, args: CliArgs) -> Self {
        debug!("Adding command line configuration source");
        self.sources.push(Box::new(CliSource::new(args)));
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ProxyConfig> {
        let mut values = ConfigValues::default();
        let mut sources = HashMap::new();

        debug!("Building configuration from {} sources", self.sources.len());

        // Lowest to highest priority
        for source in self.sources {
            let source_type = source.source_type();
            debug!("Loading configuration from source: {}", source_type);

            let layer = source.load()?;
            values.merge(layer, source_type, &mut sources);
        }

        let mut config = ProxyConfig::from_values(values);
        config.config_file = self.config_file;
        config.sources = sources;

        if self.validate {
            debug!("Validating configuration");
            validate_config(&config)?;
        }

        config.log();

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
            .with_defaults()
            .with_file(DEFAULT_CONFIG_FILE)
            .with_env(ENV_PREFIX)
    }
}

/// Load configuration from auto-detected sources
///
/// Priority, lowest first:
/// 1. Default values
/// 2. Configuration file (`--config-file`, then `TLS_FORWARD_PROXY_CONFIG_FILE`, then `config.json`)
/// 3. Environment variables
/// 4. Command line arguments
pub fn auto_load(args: &CliArgs) -> Result<ProxyConfig> {
    let config_file = resolve_config_file(args);
    debug!("Configuration file path: {}", config_file.display());

    ConfigBuilder::new()
        .with_defaults()
        .with_file(&config_file)
        .with_env(ENV_PREFIX)
        .with_cli(args.clone())
        .build()
}

/// Pick the configuration file path from command line, environment or default
fn resolve_config_file(args: &CliArgs) -> PathBuf {
    if let Some(path) = &args.config_file {
        return path.clone();
    }

    if let Ok(path) = std::env::var(format!("{}CONFIG_FILE", ENV_PREFIX)) {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}
