//! Data forwarding module
//!
//! This module splices two byte streams for CONNECT tunnels.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::common::{ProxyError, Result};

/// Read buffer size per direction
pub const BUFFER_SIZE: usize = 8192;

/// Bytes moved through a finished tunnel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

/// Forward data between two streams until both directions are done
///
/// `pre_read` holds bytes the client sent before the tunnel was set up; they
/// reach the upstream before anything read afterwards.
///
/// EOF on one side shuts down the write half of the other side and leaves
/// the opposite direction running. An I/O error in either direction ends the
/// whole tunnel. With `idle_timeout` set, the tunnel is closed once no byte
/// has moved in either direction for that long.
///
/// # Returns
///
/// The byte counts of both directions, `pre_read` included.
pub async fn proxy_data<C, U>(
    client: C,
    pre_read: &[u8],
    mut upstream: U,
    idle_timeout: Option<Duration>,
) -> Result<TransferStats>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    if !pre_read.is_empty() {
        debug!("Forwarding {} pre-read bytes to upstream", pre_read.len());
        upstream.write_all(pre_read).await?;
    }

    let (client_reader, client_writer) = tokio::io::split(client);
    let (upstream_reader, upstream_writer) = tokio::io::split(upstream);

    let activity = Activity::new();

    let transfer = async {
        tokio::try_join!(
            copy_half(client_reader, upstream_writer, &activity, "client to upstream"),
            copy_half(upstream_reader, client_writer, &activity, "upstream to client"),
        )
    };

    let (client_to_upstream, upstream_to_client) = match idle_timeout {
        None => transfer.await?,
        Some(idle) => {
            tokio::select! {
                result = transfer => result?,
                _ = activity.idle_for(idle) => {
                    debug!("Tunnel idle for {} ms, closing", idle.as_millis());
                    return Err(ProxyError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "tunnel idle timeout",
                    )));
                }
            }
        }
    };

    Ok(TransferStats {
        client_to_upstream: client_to_upstream + pre_read.len() as u64,
        upstream_to_client,
    })
}

/// Copy one direction, shutting down the writer on EOF
async fn copy_half<R, W>(
    mut reader: ReadHalf<R>,
    mut writer: WriteHalf<W>,
    activity: &Activity,
    direction: &str,
) -> std::io::Result<u64>
where
    R: AsyncRead,
    W: AsyncWrite,
{
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        total_bytes += n as u64;
        activity.touch();
    }

    debug!("{} closed after {} bytes", direction, total_bytes);

    // Half-close: the peer sees EOF, the other direction keeps flowing
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} writer failed: {}", direction, e);
    }

    Ok(total_bytes)
}

/// Last time any byte moved through the tunnel
struct Activity {
    start: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        self.last_ms.store(self.start.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    /// Resolves once no activity was recorded for `idle`
    async fn idle_for(&self, idle: Duration) {
        loop {
            let last = self.start + Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
            let deadline = last + idle;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline.into()).await;
        }
    }
}
