//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the configuration.

pub mod builder;
pub mod cli;
pub mod defaults;
pub mod error;
pub mod source;
pub mod types;
pub mod validator;

// Re-export types and traits
pub use self::builder::{auto_load, ConfigBuilder};
pub use self::cli::CliArgs;
pub use self::defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use self::error::ConfigError;
pub use self::source::{CliSource, ConfigSource, DefaultSource, EnvSource, FileSource};
pub use self::types::{
    AuthConfig, AuthValues, ConfigValues, LimitValues, LimitsConfig, LoggingConfig, LoggingValues,
    ProxyConfig, SslConfig, SslValues, UpstreamConfig, UpstreamValues, ValueSource,
};
pub use self::validator::{validate_config, ConfigValidator};
