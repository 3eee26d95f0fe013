//! Certificate handling module
//!
//! This module provides helpers for inspecting X.509 certificates, used to
//! log which certificate the listener is serving.

use openssl::hash::MessageDigest;
use openssl::x509::X509;

use crate::common::{ProxyError, Result};

/// Parse the leaf certificate from PEM input
///
/// # Errors
///
/// Returns `CertificateLoad` if the input holds no parsable certificate.
pub fn load_cert(cert_pem: &[u8]) -> Result<X509> {
    X509::from_pem(cert_pem)
        .map_err(|e| ProxyError::CertificateLoad(format!("Failed to parse certificate: {}", e)))
}

/// Get certificate subject information
///
/// # Returns
///
/// The subject as comma separated `SN=value` pairs, e.g. `CN=proxy.local, O=Example`
pub fn get_cert_subject(cert: &X509) -> String {
    cert.subject_name()
        .entries()
        .map(|entry| {
            let name = entry.object().nid().short_name().unwrap_or("?");
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{}={}", name, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Get certificate fingerprint
///
/// # Returns
///
/// The SHA-256 fingerprint as lowercase colon separated hex
pub fn get_cert_fingerprint(cert: &X509) -> Result<String> {
    let digest = cert.digest(MessageDigest::sha256())?;

    Ok(digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<String>>()
        .join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::test_util::self_signed;

    #[test]
    fn test_subject() {
        let (cert, _) = self_signed("proxy.test");
        let cert = load_cert(&cert).unwrap();
        assert_eq!(get_cert_subject(&cert), "CN=proxy.test");
    }

    #[test]
    fn test_subject_with_utf8_entries() {
        use openssl::ec::{EcGroup, EcKey};
        use openssl::hash::MessageDigest;
        use openssl::nid::Nid;
        use openssl::pkey::PKey;
        use openssl::x509::{X509Builder, X509NameBuilder};

        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Zoë Networks").unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, "proxy.test").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        let cert = builder.build();

        assert_eq!(get_cert_subject(&cert), "O=Zoë Networks, CN=proxy.test");
    }

    #[test]
    fn test_fingerprint_format() {
        let (cert, _) = self_signed("proxy.test");
        let cert = load_cert(&cert).unwrap();

        let fingerprint = get_cert_fingerprint(&cert).unwrap();
        assert_eq!(fingerprint.len(), 32 * 3 - 1);
        assert!(fingerprint.split(':').all(|b| b.len() == 2));
    }

    #[test]
    fn test_fingerprints_differ() {
        let (a, _) = self_signed("proxy.test");
        let (b, _) = self_signed("proxy.test");

        let a = get_cert_fingerprint(&load_cert(&a).unwrap()).unwrap();
        let b = get_cert_fingerprint(&load_cert(&b).unwrap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_load_invalid() {
        assert!(matches!(load_cert(b"garbage"), Err(ProxyError::CertificateLoad(_))));
    }
}
