//! Default configuration values
//!
//! Single source of truth for defaults, used when no source supplies a value.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TLS_FORWARD_PROXY_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default listen host
pub const HOST_STR: &str = "0.0.0.0";

/// Default listen port
pub const PORT: u16 = 8443;

/// Default certificate path as string
pub const CERT_PATH_STR: &str = "certs/server.crt";

/// Default private key path as string
pub const KEY_PATH_STR: &str = "certs/server.key";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default per-request timeout in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default upstream connect timeout in milliseconds
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default cap on concurrent client connections
pub const MAX_CONNECTIONS: usize = 10_000;

/// Default tunnel idle timeout in milliseconds (0 disables it)
pub const TUNNEL_IDLE_TIMEOUT_MS: u64 = 0;

/// Realm advertised in the `Proxy-Authenticate` challenge
pub const AUTH_REALM: &str = "Proxy Server";

/// Log levels accepted by the configuration
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
