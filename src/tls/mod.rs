//! TLS handling module
//!
//! This module handles TLS connections and certificate-related functionality:
//! the client-facing acceptor, its hot-swappable store, and the connector
//! used for https upstreams.

pub mod acceptor;
pub mod cert;
pub mod connector;
pub mod store;

#[cfg(test)]
pub(crate) mod test_util;

pub use acceptor::create_tls_acceptor;
pub use cert::{get_cert_fingerprint, get_cert_subject, load_cert};
pub use connector::UpstreamConnector;
pub use store::TlsStore;
