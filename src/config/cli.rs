//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::config::types::{AuthValues, ConfigValues, LimitValues, LoggingValues, SslValues, UpstreamValues};

/// TLS forward proxy with Basic authentication, HTTP relay and CONNECT tunnels
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "tls-forward-proxy", version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Listen host or IP
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Require Basic proxy authentication (true/false)
    #[arg(long, value_name = "BOOL")]
    pub auth_enabled: Option<bool>,

    /// Expected proxy username
    #[arg(long)]
    pub username: Option<String>,

    /// Expected proxy password
    #[arg(long)]
    pub password: Option<String>,

    /// Server certificate path (PEM)
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,

    /// Server private key path (PEM)
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Prefix log lines with a timestamp (true/false)
    #[arg(long, value_name = "BOOL")]
    pub log_timestamp: Option<bool>,

    /// Accept any upstream certificate on https relays (true/false)
    #[arg(long, value_name = "BOOL")]
    pub insecure_upstream_tls: Option<bool>,

    /// Upstream connect timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub connect_timeout: Option<u64>,

    /// Maximum concurrent client connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Close tunnels idle for this many milliseconds (0 disables)
    #[arg(long, value_name = "MS")]
    pub tunnel_idle_timeout: Option<u64>,
}

impl CliArgs {
    /// Convert the parsed arguments into a configuration layer
    pub fn to_values(&self) -> ConfigValues {
        ConfigValues {
            host: self.host.clone(),
            port: self.port,
            auth: AuthValues {
                enabled: self.auth_enabled,
                username: self.username.clone(),
                password: self.password.clone(),
            },
            ssl: SslValues {
                cert: self.cert.clone(),
                key: self.key.clone(),
            },
            timeout: self.timeout,
            logging: LoggingValues {
                level: self.log_level.clone(),
                timestamp: self.log_timestamp,
            },
            upstream: UpstreamValues {
                insecure_tls: self.insecure_upstream_tls,
                connect_timeout: self.connect_timeout,
            },
            limits: LimitValues {
                max_connections: self.max_connections,
                tunnel_idle_timeout: self.tunnel_idle_timeout,
            },
        }
    }
}
