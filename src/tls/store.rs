//! Hot-swappable TLS acceptor
//!
//! The listener loads the current acceptor once per connection, before the
//! handshake. Swapping in new certificate material therefore only affects
//! handshakes that start afterwards; established sessions keep the acceptor
//! they were accepted with.

use arc_swap::ArcSwap;
use log::{error, info};
use openssl::ssl::SslAcceptor;
use std::path::Path;
use std::sync::Arc;

use crate::common::{read_file, ProxyError, Result};
use crate::tls::acceptor::create_tls_acceptor;
use crate::tls::cert::{get_cert_fingerprint, get_cert_subject, load_cert};

/// Holds the acceptor used for new client handshakes
pub struct TlsStore {
    current: ArcSwap<SslAcceptor>,
}

impl TlsStore {
    /// Create a store from PEM material
    ///
    /// Unlike a reload, a failure here has no previous certificate to fall
    /// back on and is returned to the caller.
    pub fn new(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let acceptor = create_tls_acceptor(cert_pem, key_pem)?;
        log_certificate(cert_pem);

        Ok(Self::from_acceptor(acceptor))
    }

    /// Create a store from PEM files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let (cert, key) = read_pair(cert_path, key_path)?;
        Self::new(&cert, &key)
    }

    /// Wrap an already built acceptor
    pub fn from_acceptor(acceptor: SslAcceptor) -> Self {
        Self {
            current: ArcSwap::from_pointee(acceptor),
        }
    }

    /// Snapshot of the acceptor for a new handshake
    pub fn current(&self) -> Arc<SslAcceptor> {
        self.current.load_full()
    }

    /// Replace the certificate used for new handshakes
    ///
    /// # Parameters
    ///
    /// * `key_pem` - PEM private key
    /// * `cert_pem` - PEM certificate, optionally followed by its chain
    ///
    /// # Errors
    ///
    /// Returns `CertificateLoad` if the material cannot be used. The previous
    /// certificate stays in effect in that case.
    pub fn apply_certificate(&self, key_pem: &[u8], cert_pem: &[u8]) -> Result<()> {
        match create_tls_acceptor(cert_pem, key_pem) {
            Ok(acceptor) => {
                self.current.store(Arc::new(acceptor));
                info!("Applied new TLS certificate");
                log_certificate(cert_pem);
                Ok(())
            }
            Err(e) => {
                error!("Certificate update rejected, keeping the previous certificate: {}", e);
                Err(match e {
                    ProxyError::CertificateLoad(_) => e,
                    other => ProxyError::CertificateLoad(other.to_string()),
                })
            }
        }
    }

    /// Re-read certificate and key files and apply them
    pub fn reload_from_files(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        info!("Reloading TLS certificate from {}", cert_path.display());
        let (cert, key) = read_pair(cert_path, key_path).inspect_err(|e| {
            error!("Certificate reload failed, keeping the previous certificate: {}", e);
        })?;
        self.apply_certificate(&key, &cert)
    }
}

fn read_pair(cert_path: &Path, key_path: &Path) -> Result<(Vec<u8>, Vec<u8>)> {
    let cert = read_file(cert_path).map_err(|e| ProxyError::CertificateLoad(e.to_string()))?;
    let key = read_file(key_path).map_err(|e| ProxyError::CertificateLoad(e.to_string()))?;
    Ok((cert, key))
}

fn log_certificate(cert_pem: &[u8]) {
    if let Ok(cert) = load_cert(cert_pem) {
        info!("Certificate subject: {}", get_cert_subject(&cert));
        if let Ok(fingerprint) = get_cert_fingerprint(&cert) {
            info!("Certificate fingerprint (SHA-256): {}", fingerprint);
        }
    }
}
