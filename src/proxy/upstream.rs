//! Upstream connections
//!
//! Dialing helpers shared by the HTTP relay and the CONNECT tunnel.

use log::debug;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::common::{ProxyError, Result};
use crate::proxy::target::{join_host_port, Scheme};
use crate::tls::UpstreamConnector;

/// Open a TCP connection to `host:port` within `connect_timeout`
///
/// # Errors
///
/// `UpstreamTimeout` when the deadline passes, `UpstreamConnect` for any
/// other failure (DNS, refused, unreachable).
pub async fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let target = join_host_port(host, port);
    debug!("Connecting to upstream {}", target);

    let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ProxyError::UpstreamTimeout {
            target: target.clone(),
            timeout: connect_timeout,
        })?
        .map_err(|e| ProxyError::UpstreamConnect {
            target: target.clone(),
            reason: e.to_string(),
        })?;

    // Relayed traffic is often small interactive writes
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", target, e);
    }

    Ok(stream)
}

/// Transport to an origin server, selected by the request scheme
pub enum UpstreamStream {
    Plain(TcpStream),
    Tls(SslStream<TcpStream>),
}

impl UpstreamStream {
    /// Dial `host:port` with the transport `scheme` implies
    ///
    /// The TLS handshake counts towards `connect_timeout`.
    pub async fn connect(
        scheme: Scheme,
        host: &str,
        port: u16,
        connector: &UpstreamConnector,
        connect_timeout: Duration,
    ) -> Result<Self> {
        match scheme {
            Scheme::Http => Ok(UpstreamStream::Plain(connect_tcp(host, port, connect_timeout).await?)),
            Scheme::Https => {
                let dial = async {
                    let tcp = connect_tcp(host, port, connect_timeout).await?;
                    connector.connect(host, tcp).await
                };
                let stream = timeout(connect_timeout, dial)
                    .await
                    .map_err(|_| ProxyError::UpstreamTimeout {
                        target: join_host_port(host, port),
                        timeout: connect_timeout,
                    })??;
                Ok(UpstreamStream::Tls(stream))
            }
        }
    }
}

impl AsyncRead for UpstreamStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            UpstreamStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for UpstreamStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            UpstreamStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_flush(cx),
            UpstreamStream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            UpstreamStream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
