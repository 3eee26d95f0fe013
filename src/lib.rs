//! TLS Forward Proxy
//!
//! This library implements an HTTP forward proxy that accepts clients over
//! TLS, authenticates them with Basic proxy credentials, relays plain HTTP
//! requests to their origin server, and opens raw tunnels for CONNECT.
//!
//! # Main Features
//!
//! - TLS termination with hot certificate reload
//! - `Proxy-Authorization: Basic` checking with constant-time comparison
//! - Streaming HTTP relay over http and https upstreams
//! - CONNECT tunnels with half-close semantics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tls_forward_proxy::{Proxy, Result, TlsStore};
//! use tls_forward_proxy::config::ProxyConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(ProxyConfig::default());
//!     let tls = Arc::new(TlsStore::from_files(config.cert(), config.key())?);
//!
//!     let proxy = Proxy::bind(config, tls).await?;
//!     proxy.run().await
//! }
//! ```

pub mod auth;
pub mod common;
pub mod config;
pub mod lifecycle;
pub mod proxy;
pub mod tls;

// Re-export commonly used structures and functions for convenience
pub use auth::{AuthOutcome, CredentialVerifier};
pub use common::{ProxyError, Result};
pub use proxy::{Proxy, ProxyHandle};
pub use tls::{create_tls_acceptor, TlsStore};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
