//! Basic credential verification

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use openssl::memcmp;

use crate::config::ProxyConfig;

/// Result of checking a presented credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credential matches, or authentication is disabled
    Authorized,
    /// No credential, wrong scheme, or wrong username/password
    Unauthorized,
    /// The Basic payload could not be decoded
    Malformed,
}

impl AuthOutcome {
    /// Whether the request may proceed
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthOutcome::Authorized)
    }
}

/// Checks `Proxy-Authorization` values against the configured identity
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    enabled: bool,
    username: String,
    password: String,
}

impl CredentialVerifier {
    /// Create a verifier that requires the given credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            enabled: true,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Create a verifier that authorizes every request
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            username: String::new(),
            password: String::new(),
        }
    }

    /// Build a verifier from the resolved configuration
    pub fn from_config(config: &ProxyConfig) -> Self {
        if !config.auth.enabled {
            return Self::disabled();
        }

        Self::new(
            config.auth.username.clone().unwrap_or_default(),
            config.auth.password.clone().unwrap_or_default(),
        )
    }

    /// Whether credentials are checked at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Verify a `Proxy-Authorization` header value
    ///
    /// # Parameters
    ///
    /// * `header_value` - The raw header value, if the client sent one
    ///
    /// # Returns
    ///
    /// `Authorized` when authentication is disabled or the credential matches.
    pub fn verify(&self, header_value: Option<&str>) -> AuthOutcome {
        if !self.enabled {
            return AuthOutcome::Authorized;
        }

        let Some(value) = header_value else {
            debug!("No proxy credentials presented");
            return AuthOutcome::Unauthorized;
        };

        let Some(encoded) = strip_basic_scheme(value) else {
            debug!("Proxy credentials use an unsupported scheme");
            return AuthOutcome::Unauthorized;
        };

        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Invalid base64 in proxy credentials: {}", e);
                return AuthOutcome::Malformed;
            }
        };

        let Ok(decoded) = String::from_utf8(decoded) else {
            debug!("Proxy credentials are not valid UTF-8");
            return AuthOutcome::Malformed;
        };

        let Some((username, password)) = decoded.split_once(':') else {
            debug!("Proxy credentials lack a ':' separator");
            return AuthOutcome::Malformed;
        };

        // Evaluate both so the time taken does not depend on which one differs
        let username_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let password_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());

        if username_ok & password_ok {
            AuthOutcome::Authorized
        } else {
            debug!("Proxy credentials rejected for user '{}'", username);
            AuthOutcome::Unauthorized
        }
    }
}

/// Return the payload after a case-insensitive `Basic ` scheme token
fn strip_basic_scheme(value: &str) -> Option<&str> {
    let value = value.trim_start();
    let (scheme, rest) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("basic").then_some(rest)
}

/// Compare two byte strings without leaking the length of a common prefix
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // memcmp::eq panics on length mismatch, and lengths are not secret here
    a.len() == b.len() && memcmp::eq(a, b)
}
