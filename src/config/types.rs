//! Configuration types
//!
//! `ConfigValues` is a partial, mergeable layer as read from one source. Every
//! field is optional so that layers can be stacked. `ProxyConfig` is the
//! resolved, immutable snapshot the proxy runs with.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// `auth` section of a configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthValues {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `ssl` section of a configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SslValues {
    /// PEM certificate (chain) path
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// PEM private key path
    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// `logging` section of a configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingValues {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub timestamp: Option<bool>,
}

/// `upstream` section of a configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamValues {
    /// Accept any upstream certificate on https relays
    #[serde(default)]
    pub insecure_tls: Option<bool>,
    /// Connect timeout in milliseconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,
}

/// `limits` section of a configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitValues {
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Tunnel idle timeout in milliseconds, 0 disables it
    #[serde(default)]
    pub tunnel_idle_timeout: Option<u64>,
}

/// Configuration values
///
/// One layer of configuration as read from a single source. The JSON file
/// format is exactly this structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    /// Listen host or IP
    #[serde(default)]
    pub host: Option<String>,

    /// Listen port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub auth: AuthValues,

    #[serde(default)]
    pub ssl: SslValues,

    /// Per-request timeout in milliseconds
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub logging: LoggingValues,

    #[serde(default)]
    pub upstream: UpstreamValues,

    #[serde(default)]
    pub limits: LimitValues,
}

impl ConfigValues {
    /// Overlay `other` on top of `self`, recording the source of every value taken from it
    pub fn merge(
        &mut self,
        other: ConfigValues,
        source: ValueSource,
        sources: &mut HashMap<String, ValueSource>,
    ) {
        macro_rules! merge_field {
            ($name:expr, $($field:ident).+) => {
                if other.$($field).+.is_some() {
                    self.$($field).+ = other.$($field).+;
                    sources.insert($name.to_string(), source);
                }
            };
        }

        merge_field!("host", host);
        merge_field!("port", port);
        merge_field!("auth.enabled", auth.enabled);
        merge_field!("auth.username", auth.username);
        merge_field!("auth.password", auth.password);
        merge_field!("ssl.cert", ssl.cert);
        merge_field!("ssl.key", ssl.key);
        merge_field!("timeout", timeout);
        merge_field!("logging.level", logging.level);
        merge_field!("logging.timestamp", logging.timestamp);
        merge_field!("upstream.insecure_tls", upstream.insecure_tls);
        merge_field!("upstream.connect_timeout", upstream.connect_timeout);
        merge_field!("limits.max_connections", limits.max_connections);
        merge_field!("limits.tunnel_idle_timeout", limits.tunnel_idle_timeout);
    }
}

/// Resolved authentication settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resolved certificate paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub timestamp: bool,
}

/// Resolved upstream settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub insecure_tls: bool,
    pub connect_timeout: Duration,
}

/// Resolved resource limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitsConfig {
    pub max_connections: usize,
    /// `None` means tunnels never time out while idle
    pub tunnel_idle_timeout: Option<Duration>,
}

/// Proxy configuration
///
/// Immutable snapshot shared as `Arc<ProxyConfig>` by every connection.
/// Only the certificate material is ever replaced at runtime, and that
/// happens in the TLS store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
    pub ssl: SslConfig,
    /// Per-request timeout for the HTTP relay
    pub timeout: Duration,
    pub logging: LoggingConfig,
    pub upstream: UpstreamConfig,
    pub limits: LimitsConfig,

    /// Configuration file the values were read from, if any
    pub config_file: Option<PathBuf>,

    /// Source tracking for configuration values
    pub sources: HashMap<String, ValueSource>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_values(ConfigValues::default())
    }
}

impl ProxyConfig {
    /// Resolve a merged layer into a configuration, filling defaults for missing values
    pub fn from_values(values: ConfigValues) -> Self {
        let tunnel_idle_timeout = values
            .limits
            .tunnel_idle_timeout
            .unwrap_or(defaults::TUNNEL_IDLE_TIMEOUT_MS);

        Self {
            host: values.host.unwrap_or_else(|| defaults::HOST_STR.to_string()),
            port: values.port.unwrap_or(defaults::PORT),
            auth: AuthConfig {
                enabled: values.auth.enabled.unwrap_or(false),
                username: values.auth.username,
                password: values.auth.password,
            },
            ssl: SslConfig {
                cert: values.ssl.cert.unwrap_or_else(|| PathBuf::from(defaults::CERT_PATH_STR)),
                key: values.ssl.key.unwrap_or_else(|| PathBuf::from(defaults::KEY_PATH_STR)),
            },
            timeout: Duration::from_millis(values.timeout.unwrap_or(defaults::REQUEST_TIMEOUT_MS)),
            logging: LoggingConfig {
                level: values
                    .logging
                    .level
                    .unwrap_or_else(|| defaults::LOG_LEVEL_STR.to_string()),
                timestamp: values.logging.timestamp.unwrap_or(true),
            },
            upstream: UpstreamConfig {
                insecure_tls: values.upstream.insecure_tls.unwrap_or(false),
                connect_timeout: Duration::from_millis(
                    values.upstream.connect_timeout.unwrap_or(defaults::CONNECT_TIMEOUT_MS),
                ),
            },
            limits: LimitsConfig {
                max_connections: values.limits.max_connections.unwrap_or(defaults::MAX_CONNECTIONS),
                tunnel_idle_timeout: (tunnel_idle_timeout > 0)
                    .then(|| Duration::from_millis(tunnel_idle_timeout)),
            },
            config_file: None,
            sources: HashMap::new(),
        }
    }

    /// Address string to bind, bracketing IPv6 literals
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Certificate path
    pub fn cert(&self) -> &Path {
        &self.ssl.cert
    }

    /// Private key path
    pub fn key(&self) -> &Path {
        &self.ssl.key
    }

    /// Get the source of a configuration value
    pub fn source(&self, name: &str) -> ValueSource {
        self.sources.get(name).copied().unwrap_or(ValueSource::Default)
    }

    /// Log the configuration
    pub fn log(&self) {
        debug!("=== Configuration ===");
        debug!("  Listen address: {} (host from {}, port from {})",
               self.listen_addr(), self.source("host"), self.source("port"));
        debug!("  Authentication: {} (from {})",
               if self.auth.enabled { "enabled" } else { "disabled" }, self.source("auth.enabled"));
        if let Some(username) = &self.auth.username {
            debug!("  Username: {} (from {})", username, self.source("auth.username"));
        }
        if self.auth.password.is_some() {
            debug!("  Password: ******** (from {})", self.source("auth.password"));
        }
        debug!("  Certificate: {} (from {})", self.ssl.cert.display(), self.source("ssl.cert"));
        debug!("  Private key: {} (from {})", self.ssl.key.display(), self.source("ssl.key"));
        debug!("  Request timeout: {} ms (from {})", self.timeout.as_millis(), self.source("timeout"));
        debug!("  Log level: {} (from {})", self.logging.level, self.source("logging.level"));
        debug!("  Log timestamps: {} (from {})", self.logging.timestamp, self.source("logging.timestamp"));
        debug!("  Insecure upstream TLS: {} (from {})",
               self.upstream.insecure_tls, self.source("upstream.insecure_tls"));
        debug!("  Connect timeout: {} ms (from {})",
               self.upstream.connect_timeout.as_millis(), self.source("upstream.connect_timeout"));
        debug!("  Max connections: {} (from {})",
               self.limits.max_connections, self.source("limits.max_connections"));
        match self.limits.tunnel_idle_timeout {
            Some(idle) => debug!("  Tunnel idle timeout: {} ms", idle.as_millis()),
            None => debug!("  Tunnel idle timeout: disabled"),
        }
        if let Some(file) = &self.config_file {
            debug!("  Configuration file: {}", file.display());
        }
        debug!("=====================");
    }
}
