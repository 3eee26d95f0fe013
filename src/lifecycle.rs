//! Process lifecycle
//!
//! Maps process signals onto proxy control messages: SIGHUP reloads the
//! certificate, SIGINT and SIGTERM start a graceful shutdown.

use log::{error, info};

use crate::common::Result;
use crate::proxy::ProxyHandle;

/// Listen for process signals until a shutdown signal arrives
///
/// Reload failures are logged and the previous certificate stays in use.
#[cfg(unix)]
pub async fn handle_signals(handle: ProxyHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading certificate");
                if let Err(e) = handle.reload_certificates().await {
                    error!("Certificate reload failed: {}", e);
                }
            }
            _ = interrupt.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await
}

/// Listen for Ctrl-C and shut the proxy down
#[cfg(not(unix))]
pub async fn handle_signals(handle: ProxyHandle) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    handle.shutdown().await
}
