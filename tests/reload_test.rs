//! Certificate replacement on a running proxy

mod common;

use common::*;
use openssl::hash::MessageDigest;
use openssl::x509::X509;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

fn fingerprint_of_pem(cert_pem: &[u8]) -> Vec<u8> {
    let cert = X509::from_pem(cert_pem).unwrap();
    cert.digest(MessageDigest::sha256()).unwrap().to_vec()
}

fn peer_fingerprint(stream: &SslStream<TcpStream>) -> Vec<u8> {
    let cert = stream.ssl().peer_certificate().expect("server sent no certificate");
    cert.digest(MessageDigest::sha256()).unwrap().to_vec()
}

#[tokio::test]
async fn test_apply_certificate_affects_new_handshakes() {
    let (upstream_addr, _requests) =
        http_upstream(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n").await;
    let proxy = TestProxy::start().await;
    let original = fingerprint_of_pem(&std::fs::read(&proxy.cert_path).unwrap());

    let mut before = proxy.connect().await;
    assert_eq!(peer_fingerprint(&before), original);

    let (cert, key) = self_signed("rotated.test");
    proxy.handle.apply_certificate(&key, &cert).unwrap();

    let after = proxy.connect().await;
    assert_eq!(peer_fingerprint(&after), fingerprint_of_pem(&cert));

    // The session accepted before the swap keeps working
    let request = format!(
        "GET http://{0}/ HTTP/1.1\r\nHost: {0}\r\nProxy-Authorization: {1}\r\n\r\n",
        upstream_addr,
        valid_auth()
    );
    before.write_all(request.as_bytes()).await.unwrap();
    let head = timeout(WAIT, read_head(&mut before)).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 204"), "unexpected head: {}", head);
}

#[tokio::test]
async fn test_bad_material_keeps_current_certificate() {
    let proxy = TestProxy::start().await;
    let original = fingerprint_of_pem(&std::fs::read(&proxy.cert_path).unwrap());

    let (cert, _) = self_signed("mismatch.test");
    let (_, other_key) = self_signed("other.test");

    assert!(proxy.handle.apply_certificate(b"not a key", b"not a cert").is_err());
    assert!(proxy.handle.apply_certificate(&other_key, &cert).is_err());

    let client = proxy.connect().await;
    assert_eq!(peer_fingerprint(&client), original);
}

#[tokio::test]
async fn test_reload_certificates_rereads_files() {
    let proxy = TestProxy::start().await;

    let (cert, key) = self_signed("reloaded.test");
    std::fs::write(&proxy.cert_path, &cert).unwrap();
    std::fs::write(&proxy.key_path, &key).unwrap();

    timeout(WAIT, proxy.handle.reload_certificates()).await.unwrap().unwrap();

    let client = proxy.connect().await;
    assert_eq!(peer_fingerprint(&client), fingerprint_of_pem(&cert));
}

#[tokio::test]
async fn test_shutdown_stops_the_service() {
    let proxy = TestProxy::start().await;
    proxy.handle.shutdown().await.unwrap();

    let result = timeout(WAIT, proxy.task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(TcpStream::connect(proxy.addr).await.is_err());
}

#[tokio::test]
async fn test_apply_certificate_files() {
    let proxy = TestProxy::start().await;

    let dir = tempfile::tempdir().unwrap();
    let (cert, key) = self_signed("files.test");
    let cert_path = dir.path().join("new.crt");
    let key_path = dir.path().join("new.key");
    std::fs::write(&cert_path, &cert).unwrap();
    std::fs::write(&key_path, &key).unwrap();

    proxy.handle.apply_certificate_files(&cert_path, &key_path).unwrap();
    let client = proxy.connect().await;
    assert_eq!(peer_fingerprint(&client), fingerprint_of_pem(&cert));

    // Missing files leave the current certificate in place
    let missing = dir.path().join("missing.crt");
    assert!(proxy.handle.apply_certificate_files(&missing, &key_path).is_err());
    let client = proxy.connect().await;
    assert_eq!(peer_fingerprint(&client), fingerprint_of_pem(&cert));
}
