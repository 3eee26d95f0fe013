//! Upstream TLS connector
//!
//! Wraps an openssl `SslConnector` for https relays. Verification of the
//! upstream certificate and hostname is on unless `insecure_tls` is set.

use log::{debug, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;

use crate::common::{ProxyError, Result};

/// ALPN list offering HTTP/1.1 only
const ALPN_HTTP11: &[u8] = b"\x08http/1.1";

/// TLS client used for https upstreams
#[derive(Clone)]
pub struct UpstreamConnector {
    connector: SslConnector,
    insecure: bool,
}

impl UpstreamConnector {
    /// Create a connector that verifies upstream certificates against the system roots
    pub fn new() -> Result<Self> {
        Self::build(false)
    }

    /// Create a connector that accepts any upstream certificate
    pub fn insecure() -> Result<Self> {
        warn!("Upstream TLS certificate verification is disabled");
        Self::build(true)
    }

    /// Create a connector according to the `insecure_tls` setting
    pub fn from_insecure_flag(insecure: bool) -> Result<Self> {
        if insecure {
            Self::insecure()
        } else {
            Self::new()
        }
    }

    fn build(insecure: bool) -> Result<Self> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_alpn_protos(ALPN_HTTP11)?;
        if insecure {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(Self {
            connector: builder.build(),
            insecure,
        })
    }

    /// Whether certificate verification is disabled
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Run a client handshake over `tcp`, sending `host` as SNI
    pub async fn connect(&self, host: &str, tcp: TcpStream) -> Result<SslStream<TcpStream>> {
        let target = host.trim_start_matches('[').trim_end_matches(']');

        let ssl = self
            .connector
            .configure()?
            .verify_hostname(!self.insecure)
            .into_ssl(target)?;

        let mut stream = SslStream::new(ssl, tcp)?;
        Pin::new(&mut stream).connect().await.map_err(|e| ProxyError::UpstreamConnect {
            target: host.to_string(),
            reason: format!("TLS handshake failed: {}", e),
        })?;

        debug!("Upstream TLS session established with {}", host);
        Ok(stream)
    }
}
