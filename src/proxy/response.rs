//! Locally generated responses

use bytes::Bytes;
use http::header::{HeaderValue, CONNECTION, CONTENT_TYPE, PROXY_AUTHENTICATE};
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};

use crate::common::ProxyError;
use crate::config::defaults::AUTH_REALM;

/// Body type of every response the proxy returns
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Empty body
pub fn empty() -> ProxyBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// Body with fixed content
pub fn full<T: Into<Bytes>>(chunk: T) -> ProxyBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Plain text response with the given status
pub fn status_response(status: StatusCode, message: impl Into<String>) -> Response<ProxyBody> {
    let mut response = Response::new(full(message.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Response for a per-request error, using the error's status mapping
pub fn error_response(error: &ProxyError) -> Response<ProxyBody> {
    let status = error.status_code();
    status_response(status, status.canonical_reason().unwrap_or("Error"))
}

/// Same as `error_response`, but asks hyper to close the client connection
pub fn closing_error_response(error: &ProxyError) -> Response<ProxyBody> {
    let mut response = error_response(error);
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));
    response
}

/// 407 challenge for requests without valid proxy credentials
///
/// The connection is closed after the response is written.
pub fn proxy_auth_required() -> Response<ProxyBody> {
    let mut response = closing_error_response(&ProxyError::AuthFailure);

    // The realm is a constant without quotes or control characters
    let challenge = format!("Basic realm=\"{}\"", AUTH_REALM);
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(PROXY_AUTHENTICATE, value);
    }
    response
}

/// Success line for an accepted CONNECT
pub fn tunnel_established() -> Response<ProxyBody> {
    Response::new(empty())
}
