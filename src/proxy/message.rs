//! Proxy message types
//!
//! This module defines the messages that can be sent to a running proxy
//! service, and the cloneable handle used to send them.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::common::{ProxyError, Result};
use crate::tls::TlsStore;

/// Messages that can be sent to the proxy service
#[derive(Debug)]
pub enum ProxyMessage {
    /// Re-read the configured certificate and key files
    ReloadCertificates {
        /// Receives the outcome of the reload
        response: oneshot::Sender<Result<()>>,
    },
    /// Stop accepting and drain connections
    Shutdown,
}

/// Proxy control handle
///
/// Lets signal handlers and embedding code control the proxy service
/// without sharing the service itself.
#[derive(Clone)]
pub struct ProxyHandle {
    sender: mpsc::Sender<ProxyMessage>,
    tls: Arc<TlsStore>,
}

impl ProxyHandle {
    /// Create a new proxy handle
    pub fn new(sender: mpsc::Sender<ProxyMessage>, tls: Arc<TlsStore>) -> Self {
        Self { sender, tls }
    }

    /// Send a message to the proxy service
    pub async fn send(&self, message: ProxyMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| ProxyError::ServiceStopped)
    }

    /// Replace the served certificate with PEM material
    ///
    /// Takes effect for handshakes that start after the call returns.
    pub fn apply_certificate(&self, key_pem: &[u8], cert_pem: &[u8]) -> Result<()> {
        self.tls.apply_certificate(key_pem, cert_pem)
    }

    /// Replace the served certificate with the contents of PEM files
    pub fn apply_certificate_files(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        self.tls.reload_from_files(cert_path, key_path)
    }

    /// Reload the certificate from the configured paths
    pub async fn reload_certificates(&self) -> Result<()> {
        let (response, result) = oneshot::channel();
        self.send(ProxyMessage::ReloadCertificates { response }).await?;
        result.await.map_err(|_| ProxyError::ServiceStopped)?
    }

    /// Shutdown the proxy service
    pub async fn shutdown(&self) -> Result<()> {
        self.send(ProxyMessage::Shutdown).await
    }
}

/// Create a new proxy message channel
pub fn create_channel(tls: Arc<TlsStore>) -> (ProxyHandle, mpsc::Receiver<ProxyMessage>) {
    let (tx, rx) = mpsc::channel(16);
    (ProxyHandle::new(tx, tls), rx)
}
