//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use std::path::Path;
use tokio::sync::Semaphore;

use crate::config::defaults::LOG_LEVELS;
use crate::config::error::{ConfigError, Result};
use crate::config::types::ProxyConfig;

/// Validate the configuration
pub fn validate_config(config: &ProxyConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_auth_settings(config)?;
    validate_certificate_settings(config)?;
    validate_general_settings(config)?;

    Ok(())
}

fn validate_network_settings(config: &ProxyConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            "host".to_string(),
            "Listen host must not be empty".to_string(),
        ));
    }

    if config.port == 0 {
        return Err(ConfigError::InvalidValue(
            "port".to_string(),
            "Port must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth_settings(config: &ProxyConfig) -> Result<()> {
    if !config.auth.enabled {
        return Ok(());
    }

    let has_username = config.auth.username.as_deref().is_some_and(|u| !u.is_empty());
    if !has_username || config.auth.password.is_none() {
        return Err(ConfigError::InvalidCombination(
            "auth.enabled requires both auth.username and auth.password".to_string(),
        ));
    }

    // A colon would make the decoded credential pair ambiguous
    if config.auth.username.as_deref().is_some_and(|u| u.contains(':')) {
        return Err(ConfigError::InvalidValue(
            "auth.username".to_string(),
            "Username must not contain ':'".to_string(),
        ));
    }

    Ok(())
}

fn validate_certificate_settings(config: &ProxyConfig) -> Result<()> {
    validate_file_exists(config.cert())?;
    validate_file_exists(config.key())?;
    Ok(())
}

fn validate_general_settings(config: &ProxyConfig) -> Result<()> {
    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue(
            "logging.level".to_string(),
            format!("Unknown log level '{}', expected one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        ));
    }

    if config.timeout.is_zero() {
        return Err(ConfigError::InvalidValue(
            "timeout".to_string(),
            "Request timeout must be greater than 0".to_string(),
        ));
    }

    if config.upstream.connect_timeout.is_zero() {
        return Err(ConfigError::InvalidValue(
            "upstream.connect_timeout".to_string(),
            "Connect timeout must be greater than 0".to_string(),
        ));
    }

    if config.limits.max_connections == 0 {
        return Err(ConfigError::InvalidValue(
            "limits.max_connections".to_string(),
            "Connection limit must be greater than 0".to_string(),
        ));
    }

    if config.limits.max_connections > Semaphore::MAX_PERMITS {
        return Err(ConfigError::InvalidValue(
            "limits.max_connections".to_string(),
            format!("Connection limit must not exceed {}", Semaphore::MAX_PERMITS),
        ));
    }

    Ok(())
}

fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    Ok(())
}

/// Configuration validator trait
pub trait ConfigValidator {
    /// Check configuration for warnings
    fn check_warnings(&self) -> Vec<String>;
}

impl ConfigValidator for ProxyConfig {
    fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.auth.enabled {
            warnings.push(
                "Proxy authentication is disabled; any client reaching the listener can use the proxy".to_string(),
            );
        }

        if self.upstream.insecure_tls {
            warnings.push(
                "Upstream certificate verification is disabled for https relays".to_string(),
            );
        }

        if self.timeout < self.upstream.connect_timeout {
            warnings.push(format!(
                "Request timeout ({} ms) is shorter than the connect timeout ({} ms)",
                self.timeout.as_millis(),
                self.upstream.connect_timeout.as_millis()
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ConfigValues, SslValues};
    use std::time::Duration;

    fn config_with_certs() -> (tempfile::TempDir, ProxyConfig) {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.crt");
        let key = dir.path().join("server.key");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();

        let config = ProxyConfig::from_values(ConfigValues {
            ssl: SslValues { cert: Some(cert), key: Some(key) },
            ..Default::default()
        });
        (dir, config)
    }

    #[test]
    fn test_valid_config() {
        let (_dir, config) = config_with_certs();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_certificate() {
        let config = ProxyConfig::default();
        assert!(matches!(validate_config(&config), Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_auth_requires_credentials() {
        let (_dir, mut config) = config_with_certs();
        config.auth.enabled = true;
        config.auth.username = Some("alice".to_string());
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));

        config.auth.password = Some("pw".to_string());
        assert!(validate_config(&config).is_ok());

        config.auth.username = Some("al:ice".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let (_dir, config) = config_with_certs();

        let mut bad = config.clone();
        bad.port = 0;
        assert!(validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.timeout = Duration::ZERO;
        assert!(validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.logging.level = "verbose".to_string();
        assert!(validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.limits.max_connections = 0;
        assert!(validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.limits.max_connections = usize::MAX;
        assert!(matches!(
            validate_config(&bad),
            Err(ConfigError::InvalidValue(field, _)) if field == "limits.max_connections"
        ));

        let mut at_limit = config;
        at_limit.limits.max_connections = Semaphore::MAX_PERMITS;
        assert!(validate_config(&at_limit).is_ok());
    }

    #[test]
    fn test_warnings() {
        let (_dir, mut config) = config_with_certs();
        assert_eq!(config.check_warnings().len(), 1, "Auth disabled by default");

        config.auth.enabled = true;
        config.upstream.insecure_tls = true;
        let warnings = config.check_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("verification"));
    }
}
