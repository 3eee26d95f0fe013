//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use http::StatusCode;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Forward proxy error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// OpenSSL error
    #[error("OpenSSL error: {0}")]
    Ssl(#[from] openssl::error::ErrorStack),

    /// TLS handshake error on the client side
    #[error("TLS handshake error: {0}")]
    TlsHandshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or invalid proxy credentials
    #[error("Proxy authentication failed")]
    AuthFailure,

    /// The request target cannot be relayed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Could not open a connection to the upstream
    #[error("Failed to connect to upstream {target}: {reason}")]
    UpstreamConnect {
        /// host:port that was dialed
        target: String,
        /// Underlying failure
        reason: String,
    },

    /// Upstream did not answer within the configured timeout
    #[error("Upstream {target} timed out after {}ms", .timeout.as_millis())]
    UpstreamTimeout {
        /// host:port that was dialed
        target: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The upstream request failed after the connection was established
    #[error("Upstream protocol error: {0}")]
    UpstreamProtocol(String),

    /// Certificate or private key could not be loaded
    #[error("Certificate load error: {0}")]
    CertificateLoad(String),

    /// The listen socket could not be bound
    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        /// Address that could not be bound
        addr: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The proxy service loop is no longer running
    #[error("Proxy service is not running")]
    ServiceStopped,
}

impl ProxyError {
    /// HTTP status reported to the client for a per-request error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::AuthFailure => StatusCode::PROXY_AUTHENTICATION_REQUIRED,
            ProxyError::UpstreamConnect { .. } | ProxyError::UpstreamProtocol(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
