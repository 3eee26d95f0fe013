//! Proxy server module
//!
//! This module implements the accept loop: it binds the listen socket, caps
//! concurrent connections, hands each one to the connection handler, and
//! processes control messages until shutdown.

use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::common::{ProxyError, Result};
use crate::config::ProxyConfig;
use crate::tls::TlsStore;
use super::handler::{handle_connection, ProxyContext};
use super::message::{create_channel, ProxyHandle, ProxyMessage};

/// How long in-flight connections may run after shutdown is requested
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Proxy server structure
///
/// Terminates client TLS and serves forward-proxy requests on every
/// accepted connection.
pub struct Proxy {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Arc<ProxyConfig>,
    tls: Arc<TlsStore>,
    context: Arc<ProxyContext>,
    limiter: Arc<Semaphore>,
    handle: ProxyHandle,
    messages: mpsc::Receiver<ProxyMessage>,
}

impl Proxy {
    /// Bind the listen socket
    ///
    /// # Parameters
    ///
    /// * `config` - Resolved configuration
    /// * `tls` - Store holding the certificate to serve
    ///
    /// # Errors
    ///
    /// Returns `Listen` if the address cannot be bound, e.g. because the
    /// port is already in use.
    pub async fn bind(config: Arc<ProxyConfig>, tls: Arc<TlsStore>) -> Result<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ProxyError::Listen { addr: addr.clone(), source })?;
        let local_addr = listener.local_addr()?;

        let context = Arc::new(ProxyContext::from_config(&config)?);
        let (handle, messages) = create_channel(Arc::clone(&tls));

        Ok(Self {
            listener,
            local_addr,
            limiter: Arc::new(Semaphore::new(config.limits.max_connections)),
            config,
            tls,
            context,
            handle,
            messages,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Control handle for this server
    pub fn handle(&self) -> ProxyHandle {
        self.handle.clone()
    }

    /// Start the proxy service
    ///
    /// Runs until a `Shutdown` message arrives, then stops accepting and
    /// gives in-flight connections up to `SHUTDOWN_GRACE` to finish.
    pub async fn run(self) -> Result<()> {
        let Proxy {
            listener,
            local_addr,
            config,
            tls,
            context,
            limiter,
            handle,
            mut messages,
        } = self;

        info!("Proxy service started, listening on {}", local_addr);

        // The server's own handle would keep the channel open forever
        drop(handle);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(ProxyMessage::ReloadCertificates { response }) => {
                        let result = tls.reload_from_files(config.cert(), config.key());
                        let _ = response.send(result);
                    }
                    Some(ProxyMessage::Shutdown) => {
                        info!("Received shutdown message");
                        break;
                    }
                    None => {
                        debug!("All proxy handles dropped");
                        break;
                    }
                },

                accepted = accept_with_permit(&listener, &limiter) => match accepted {
                    Ok((client_stream, client_addr, permit)) => {
                        debug!("Accepted connection from {}", client_addr);

                        // Snapshot before the handshake; later swaps only affect new connections
                        let acceptor = tls.current();
                        let context = Arc::clone(&context);
                        let shutdown = shutdown_rx.clone();

                        tasks.spawn(async move {
                            let result = handle_connection(client_stream, client_addr, acceptor, context, shutdown).await;
                            match result {
                                Ok(()) => debug!("Connection from {} closed", client_addr),
                                Err(ProxyError::TlsHandshake(e)) => {
                                    debug!("TLS handshake with {} failed: {}", client_addr, e)
                                }
                                Err(e) => debug!("Connection from {} ended with error: {}", client_addr, e),
                            }
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },

                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        error!("Task error: {}", e);
                    }
                }
            }
        }

        drop(listener);
        let _ = shutdown_tx.send(true);

        info!("Waiting for {} connections to complete...", tasks.len());
        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!("Task error during shutdown: {}", e);
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("Shutdown timeout reached, aborting {} connections", tasks.len());
            tasks.shutdown().await;
        }

        info!("Proxy service shutdown complete");
        Ok(())
    }
}

/// Wait for a free connection slot, then accept
async fn accept_with_permit(
    listener: &TcpListener,
    limiter: &Arc<Semaphore>,
) -> std::io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
    let permit = Arc::clone(limiter)
        .acquire_owned()
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "connection limiter closed"))?;
    let (stream, addr) = listener.accept().await?;
    Ok((stream, addr, permit))
}
