//! TLS acceptor creation

use log::debug;
use openssl::pkey::PKey;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::X509;

use crate::common::{ProxyError, Result};

/// Create a TLS acceptor from PEM material
///
/// The certificate input may hold a chain; the first certificate is the
/// leaf and the rest are sent as intermediates.
///
/// # Example
///
/// ```no_run
/// # use tls_forward_proxy::tls::create_tls_acceptor;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cert = std::fs::read("certs/server.crt")?;
/// let key = std::fs::read("certs/server.key")?;
/// let acceptor = create_tls_acceptor(&cert, &key)?;
/// # Ok(())
/// # }
/// ```
pub fn create_tls_acceptor(cert_pem: &[u8], key_pem: &[u8]) -> Result<SslAcceptor> {
    let mut chain = X509::stack_from_pem(cert_pem)
        .map_err(|e| ProxyError::CertificateLoad(format!("Invalid certificate PEM: {}", e)))?
        .into_iter();

    let leaf = chain
        .next()
        .ok_or_else(|| ProxyError::CertificateLoad("No certificate found in PEM input".to_string()))?;

    let key = PKey::private_key_from_pem(key_pem)
        .map_err(|e| ProxyError::CertificateLoad(format!("Invalid private key PEM: {}", e)))?;

    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

    builder
        .set_certificate(&leaf)
        .map_err(|e| ProxyError::CertificateLoad(format!("Failed to apply certificate: {}", e)))?;

    for intermediate in chain {
        builder
            .add_extra_chain_cert(intermediate)
            .map_err(|e| ProxyError::CertificateLoad(format!("Failed to add chain certificate: {}", e)))?;
    }

    builder
        .set_private_key(&key)
        .map_err(|e| ProxyError::CertificateLoad(format!("Failed to apply private key: {}", e)))?;

    builder
        .check_private_key()
        .map_err(|_| ProxyError::CertificateLoad("Private key does not match certificate".to_string()))?;

    debug!("TLS acceptor created");

    Ok(builder.build())
}
