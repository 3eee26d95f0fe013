//! CONNECT tunnels
//!
//! A tunnel moves through Connecting, Tunneling and Closed. The upstream is
//! dialed while the CONNECT request is still pending so that the client gets
//! either a success line followed by raw bytes, or a single failure line and
//! a closed connection.

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::common::{ProxyError, Result};
use crate::proxy::forwarder::{proxy_data, TransferStats};
use crate::proxy::handler::ClientIo;
use crate::proxy::response::{closing_error_response, tunnel_established, ProxyBody};
use crate::proxy::target::{join_host_port, parse_authority};
use crate::proxy::upstream::connect_tcp;

/// Settings for CONNECT handling
#[derive(Debug, Clone, Copy)]
pub struct TunnelSettings {
    pub connect_timeout: Duration,
    /// `None` keeps idle tunnels open
    pub idle_timeout: Option<Duration>,
}

/// A tunnel whose upstream is connected, waiting for the client connection
/// to be handed over by the HTTP layer
pub struct PendingTunnel {
    target: String,
    upstream: TcpStream,
    on_upgrade: OnUpgrade,
    idle_timeout: Option<Duration>,
}

/// Handle an authorized CONNECT request
///
/// # Returns
///
/// The response to write and, on success, the tunnel to run once hyper has
/// released the client connection. On failure the response is a 502 that
/// closes the connection.
pub async fn establish(
    mut req: Request<Incoming>,
    settings: &TunnelSettings,
) -> (Response<ProxyBody>, Option<PendingTunnel>) {
    let authority = req
        .uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| req.uri().to_string());

    match connect(&authority, settings).await {
        Ok((target, upstream)) => {
            info!("Tunnel to {} established", target);
            let pending = PendingTunnel {
                target,
                upstream,
                on_upgrade: hyper::upgrade::on(&mut req),
                idle_timeout: settings.idle_timeout,
            };
            (tunnel_established(), Some(pending))
        }
        Err(e) => {
            warn!("CONNECT {} failed: {}", authority, e);
            (closing_error_response(&e), None)
        }
    }
}

async fn connect(authority: &str, settings: &TunnelSettings) -> Result<(String, TcpStream)> {
    let (host, port) = parse_authority(authority)?;
    let upstream = connect_tcp(&host, port, settings.connect_timeout).await?;
    Ok((join_host_port(&host, port), upstream))
}

impl PendingTunnel {
    /// Host and port of the upstream
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Take over the client connection and splice it with the upstream
    pub async fn run(self) -> Result<TransferStats> {
        let upgraded = self
            .on_upgrade
            .await
            .map_err(|e| ProxyError::UpstreamProtocol(format!("Client upgrade failed: {}", e)))?;

        let result = splice_upgraded(upgraded, self.upstream, self.idle_timeout).await;

        match &result {
            Ok(stats) => info!(
                "Tunnel to {} closed ({} bytes up, {} bytes down)",
                self.target, stats.client_to_upstream, stats.upstream_to_client
            ),
            Err(e) => debug!("Tunnel to {} closed with error: {}", self.target, e),
        }
        result
    }
}

/// Recover the client socket and any bytes hyper read past the CONNECT head
async fn splice_upgraded(
    upgraded: Upgraded,
    upstream: TcpStream,
    idle_timeout: Option<Duration>,
) -> Result<TransferStats> {
    match upgraded.downcast::<ClientIo>() {
        Ok(parts) => {
            proxy_data(parts.io.into_inner(), &parts.read_buf, upstream, idle_timeout).await
        }
        // Upgraded replays its own buffer before reading the socket
        Err(upgraded) => proxy_data(TokioIo::new(upgraded), &[], upstream, idle_timeout).await,
    }
}
