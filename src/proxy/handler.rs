//! Connection handler module
//!
//! This module handles individual client connections: the TLS handshake,
//! the HTTP/1.1 exchange, and the hand-off to a CONNECT tunnel.

use http::header::PROXY_AUTHORIZATION;
use http::{Method, Request, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, info};
use openssl::ssl::{Ssl, SslAcceptor};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_openssl::SslStream;

use crate::auth::{AuthOutcome, CredentialVerifier};
use crate::common::{ProxyError, Result};
use crate::config::ProxyConfig;
use crate::proxy::relay::{relay, RelaySettings};
use crate::proxy::response::{proxy_auth_required, ProxyBody};
use crate::proxy::tunnel::{self, PendingTunnel, TunnelSettings};
use crate::tls::UpstreamConnector;

/// Client connection type as served by hyper
pub type ClientIo = TokioIo<SslStream<TcpStream>>;

/// State shared by every connection
pub struct ProxyContext {
    pub verifier: CredentialVerifier,
    pub relay: RelaySettings,
    pub tunnel: TunnelSettings,
    /// Bound on the client TLS handshake
    pub handshake_timeout: Duration,
}

impl ProxyContext {
    /// Build the shared context from the configuration
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        Ok(Self {
            verifier: CredentialVerifier::from_config(config),
            relay: RelaySettings {
                connector: UpstreamConnector::from_insecure_flag(config.upstream.insecure_tls)?,
                request_timeout: config.timeout,
                connect_timeout: config.upstream.connect_timeout,
            },
            tunnel: TunnelSettings {
                connect_timeout: config.upstream.connect_timeout,
                idle_timeout: config.limits.tunnel_idle_timeout,
            },
            handshake_timeout: config.timeout,
        })
    }
}

/// Tunnel accepted on this connection, run after hyper lets go of the socket
type TunnelSlot = Arc<Mutex<Option<PendingTunnel>>>;

/// Handle a single client connection
///
/// # Parameters
///
/// * `client_stream` - Accepted TCP stream
/// * `client_addr` - Peer address, for logging
/// * `tls_acceptor` - Acceptor snapshot taken for this connection
/// * `context` - Shared proxy state
/// * `shutdown` - Flips to `true` when the server is shutting down
///
/// # Returns
///
/// Returns `Ok(())` when the connection ended normally.
pub async fn handle_connection(
    client_stream: TcpStream,
    client_addr: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
    context: Arc<ProxyContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let ssl = Ssl::new(tls_acceptor.context()).map_err(ProxyError::Ssl)?;
    let mut stream = SslStream::new(ssl, client_stream).map_err(ProxyError::Ssl)?;

    match timeout(context.handshake_timeout, Pin::new(&mut stream).accept()).await {
        Ok(Ok(())) => debug!("TLS handshake with {} successful", client_addr),
        Ok(Err(e)) => return Err(ProxyError::TlsHandshake(e.to_string())),
        Err(_) => return Err(ProxyError::TlsHandshake("handshake timed out".to_string())),
    }

    let slot: TunnelSlot = Arc::new(Mutex::new(None));

    let service = {
        let context = Arc::clone(&context);
        let slot = Arc::clone(&slot);
        service_fn(move |req| {
            let context = Arc::clone(&context);
            let slot = Arc::clone(&slot);
            async move { Ok::<_, Infallible>(dispatch(req, &context, &slot, client_addr).await) }
        })
    };

    let conn = http1::Builder::new()
        .preserve_header_case(true)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    let served = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.changed() => {
            debug!("Closing connection from {} for shutdown", client_addr);
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = served {
        debug!("Connection from {} ended: {}", client_addr, e);
    }

    let pending = slot.lock().ok().and_then(|mut slot| slot.take());
    if let Some(tunnel) = pending {
        debug!("Handing connection from {} to tunnel {}", client_addr, tunnel.target());
        tunnel.run().await?;
    }

    Ok(())
}

/// Authenticate a request and route it to the tunnel or the relay
async fn dispatch(
    req: Request<Incoming>,
    context: &ProxyContext,
    slot: &TunnelSlot,
    client_addr: SocketAddr,
) -> Response<ProxyBody> {
    let outcome = match req.headers().get(PROXY_AUTHORIZATION) {
        None => context.verifier.verify(None),
        Some(value) => match value.to_str() {
            Ok(value) => context.verifier.verify(Some(value)),
            Err(_) => AuthOutcome::Malformed,
        },
    };

    if !outcome.is_authorized() {
        info!("Rejected {} {} from {}: {:?}", req.method(), req.uri(), client_addr, outcome);
        return proxy_auth_required();
    }

    if req.method() == Method::CONNECT {
        debug!("CONNECT {} from {}", req.uri(), client_addr);
        let (response, pending) = tunnel::establish(req, &context.tunnel).await;
        if let Some(pending) = pending {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(pending);
            }
        }
        return response;
    }

    debug!("{} {} from {}", req.method(), req.uri(), client_addr);
    relay(req, &context.relay).await
}
