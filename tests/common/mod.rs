//! Shared helpers for integration tests
//!
//! Self-signed certificates, a proxy started on an ephemeral port, a TLS
//! client that skips verification, and small mock upstream servers.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::ssl::{Ssl, SslConnector, SslMethod, SslVerifyMode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_openssl::SslStream;

use tls_forward_proxy::config::{AuthValues, ConfigValues, ProxyConfig, SslValues};
use tls_forward_proxy::{create_tls_acceptor, Proxy, ProxyHandle, TlsStore};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "s3cret";

// Same generator the unit tests use
#[path = "../../src/tls/test_util.rs"]
mod test_util;
pub use test_util::self_signed;

/// A running proxy on 127.0.0.1 with an ephemeral port
pub struct TestProxy {
    pub addr: SocketAddr,
    pub handle: ProxyHandle,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub task: JoinHandle<tls_forward_proxy::Result<()>>,
    _dir: tempfile::TempDir,
}

impl TestProxy {
    /// Proxy requiring `USERNAME`/`PASSWORD`
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Proxy requiring `USERNAME`/`PASSWORD`, with extra configuration applied
    pub async fn start_with(configure: impl FnOnce(&mut ConfigValues)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");

        let (cert, key) = self_signed("proxy.test");
        std::fs::write(&cert_path, &cert).unwrap();
        std::fs::write(&key_path, &key).unwrap();

        let mut values = ConfigValues {
            host: Some("127.0.0.1".to_string()),
            port: Some(0),
            auth: AuthValues {
                enabled: Some(true),
                username: Some(USERNAME.to_string()),
                password: Some(PASSWORD.to_string()),
            },
            ssl: SslValues {
                cert: Some(cert_path.clone()),
                key: Some(key_path.clone()),
            },
            ..Default::default()
        };
        configure(&mut values);

        let config = Arc::new(ProxyConfig::from_values(values));
        let tls = Arc::new(TlsStore::from_files(&cert_path, &key_path).unwrap());
        let proxy = Proxy::bind(config, tls).await.unwrap();

        let addr = proxy.local_addr();
        let handle = proxy.handle();
        let task = tokio::spawn(proxy.run());

        Self {
            addr,
            handle,
            cert_path,
            key_path,
            task,
            _dir: dir,
        }
    }

    /// Open a TLS connection to the proxy
    pub async fn connect(&self) -> SslStream<TcpStream> {
        tls_connect(self.addr).await
    }
}

/// TLS client that accepts any server certificate
pub async fn tls_connect(addr: SocketAddr) -> SslStream<TcpStream> {
    let mut builder = SslConnector::builder(SslMethod::tls_client()).unwrap();
    builder.set_verify(SslVerifyMode::NONE);
    let connector = builder.build();

    let ssl = connector
        .configure()
        .unwrap()
        .verify_hostname(false)
        .into_ssl("proxy.test")
        .unwrap();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let mut stream = SslStream::new(ssl, tcp).unwrap();
    Pin::new(&mut stream).connect().await.unwrap();
    stream
}

/// `Proxy-Authorization` value for the given credentials
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// `Proxy-Authorization` value for the test credentials
pub fn valid_auth() -> String {
    basic_auth(USERNAME, PASSWORD)
}

/// Read an HTTP head byte by byte so no byte after the blank line is consumed
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "EOF before end of head: {:?}", String::from_utf8_lossy(&head));
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

/// Case-insensitive lookup of a header in a raw head
pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n").skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// Read until the peer closes; errors count as closed
pub async fn read_until_closed<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return data,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
}

/// A local port with nothing listening on it
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Request head (and body, if any) captured by a mock upstream
#[derive(Debug)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

/// Upstream that answers every connection with `response` and reports what it received
pub async fn http_upstream(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let length = header_value(&head, "content-length")
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                let mut body = vec![0u8; length];
                socket.read_exact(&mut body).await.unwrap();

                let _ = tx.send(CapturedRequest { head, body });
                socket.write_all(response).await.unwrap();
                socket.shutdown().await.ok();
            });
        }
    });

    (addr, rx)
}

/// HTTPS upstream with a self-signed certificate for `localhost`
///
/// Answers every request with `response` and reports what it received.
/// Connections whose handshake fails are dropped without a report.
pub async fn tls_upstream(response: &'static [u8]) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let (cert, key) = self_signed("localhost");
    let acceptor = Arc::new(create_tls_acceptor(&cert, &key).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let acceptor = Arc::clone(&acceptor);
            tokio::spawn(async move {
                let ssl = Ssl::new(acceptor.context()).unwrap();
                let mut stream = SslStream::new(ssl, socket).unwrap();
                if Pin::new(&mut stream).accept().await.is_err() {
                    return;
                }

                let head = read_head(&mut stream).await;
                let _ = tx.send(CapturedRequest { head, body: Vec::new() });
                stream.write_all(response).await.unwrap();
                stream.shutdown().await.ok();
            });
        }
    });

    (addr, rx)
}

/// Upstream that reads the request head and never answers
///
/// Reports `true` once the proxy closes the connection.
pub async fn silent_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                read_until_closed(&mut socket).await;
                let _ = tx.send(true);
            });
        }
    });

    (addr, rx)
}

/// Upstream that echoes everything back and closes when the peer does
pub async fn echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.into_split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            });
        }
    });

    addr
}

/// Upstream that hands each accepted socket to the test
pub async fn raw_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            if tx.send(socket).is_err() {
                break;
            }
        }
    });

    (addr, rx)
}

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);
