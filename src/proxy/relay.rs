//! HTTP relay
//!
//! Forwards one absolute-form request to its origin server and streams the
//! response back. Every request gets its own upstream connection; nothing is
//! pooled or reused.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, HOST, PROXY_AUTHORIZATION};
use http::{Request, Response, Version};
use hyper::body::{Body, Frame, Incoming, SizeHint};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use http_body_util::BodyExt;
use log::{debug, warn};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::common::{ProxyError, Result};
use crate::proxy::response::{error_response, ProxyBody};
use crate::proxy::target::Target;
use crate::proxy::upstream::UpstreamStream;
use crate::tls::UpstreamConnector;

/// Non-standard but widely sent by clients; must not leak upstream
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Settings the relay needs for each request
#[derive(Clone)]
pub struct RelaySettings {
    pub connector: UpstreamConnector,
    /// Bound from connect until the upstream response head arrives
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

/// Relay a request to its origin server
///
/// Errors are turned into a response here: 500 for an unusable target, 502
/// when the upstream cannot be reached or fails, 504 when it does not answer
/// in time.
pub async fn relay(req: Request<Incoming>, settings: &RelaySettings) -> Response<ProxyBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    match forward(req, settings).await {
        Ok(response) => {
            debug!("{} {} -> {}", method, uri, response.status());
            response
        }
        Err(e) => {
            match &e {
                ProxyError::MalformedRequest(_) => debug!("Rejecting {} {}: {}", method, uri, e),
                _ => warn!("Relay of {} {} failed: {}", method, uri, e),
            }
            error_response(&e)
        }
    }
}

async fn forward(req: Request<Incoming>, settings: &RelaySettings) -> Result<Response<ProxyBody>> {
    let target = Target::from_uri(req.uri())?;
    let outbound = build_outbound(req, &target)?;

    let mut conn_task: Option<JoinHandle<()>> = None;
    let exchange = timeout(
        settings.request_timeout,
        send(outbound, &target, settings, &mut conn_task),
    )
    .await;

    let result = match exchange {
        Ok(result) => result,
        Err(_) => Err(ProxyError::UpstreamTimeout {
            target: target.authority(),
            timeout: settings.request_timeout,
        }),
    };

    match result {
        Ok(response) => {
            let Some(conn_task) = conn_task else {
                return Err(ProxyError::UpstreamProtocol("Upstream connection task missing".to_string()));
            };
            Ok(response.map(|body| RelayBody { inner: body, conn_task }.boxed()))
        }
        Err(e) => {
            // Closes the upstream socket, e.g. when the response head never came
            if let Some(task) = conn_task {
                task.abort();
            }
            Err(e)
        }
    }
}

/// Rewrite a client request for the origin server
///
/// Copies all headers except the proxy credentials and `Proxy-Connection`,
/// points `Host` at the target and switches to an origin-form URI.
fn build_outbound<B>(req: Request<B>, target: &Target) -> Result<Request<B>> {
    let (mut parts, body) = req.into_parts();

    parts.headers.remove(PROXY_AUTHORIZATION);
    parts.headers.remove(PROXY_CONNECTION);

    let host = HeaderValue::from_str(&target.host_header())
        .map_err(|_| ProxyError::MalformedRequest(format!("Invalid host '{}'", target.host)))?;
    parts.headers.insert(HOST, host);

    parts.uri = target
        .path_and_query
        .parse()
        .map_err(|e| ProxyError::MalformedRequest(format!("Invalid path '{}': {}", target.path_and_query, e)))?;
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}

async fn send(
    outbound: Request<Incoming>,
    target: &Target,
    settings: &RelaySettings,
    conn_task: &mut Option<JoinHandle<()>>,
) -> Result<Response<Incoming>> {
    let stream = UpstreamStream::connect(
        target.scheme,
        &target.host,
        target.port,
        &settings.connector,
        settings.connect_timeout,
    )
    .await?;

    let (mut sender, conn) = http1::Builder::new()
        .preserve_header_case(true)
        .handshake(TokioIo::new(stream))
        .await
        .map_err(|e| ProxyError::UpstreamProtocol(format!("Handshake with {} failed: {}", target.authority(), e)))?;

    let authority = target.authority();
    *conn_task = Some(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("Upstream connection to {} ended: {}", authority, e);
        }
    }));

    sender
        .send_request(outbound)
        .await
        .map_err(|e| ProxyError::UpstreamProtocol(format!("Request to {} failed: {}", target.authority(), e)))
}

/// Response body that owns the upstream connection
///
/// Dropping it, e.g. because the client went away mid-body, aborts the
/// upstream connection task and closes the socket.
pub struct RelayBody {
    inner: Incoming,
    conn_task: JoinHandle<()>,
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for RelayBody {
    fn drop(&mut self) {
        self.conn_task.abort();
    }
}
