//! Request target parsing
//!
//! Turns an absolute-form request URI (plain relay) or an authority-form
//! CONNECT target into the host, port and transport to dial.

use http::Uri;
use std::fmt;

use crate::common::{ProxyError, Result};

/// Default port for CONNECT targets without one
pub const DEFAULT_TUNNEL_PORT: u16 = 443;

/// Upstream transport, chosen once from the request URI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Plain TCP
    Http,
    /// TLS over TCP
    Https,
}

impl Scheme {
    /// Port used when the URI does not name one
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Destination of a relayed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    /// Host without IPv6 brackets
    pub host: String,
    pub port: u16,
    /// Origin-form request target, at least `/`
    pub path_and_query: String,
}

impl Target {
    /// Parse an absolute-form request URI
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` when the URI has no scheme, an unsupported
    /// scheme, or no host.
    pub fn from_uri(uri: &Uri) -> Result<Self> {
        let scheme = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("http") => Scheme::Http,
            Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
            Some(s) => {
                return Err(ProxyError::MalformedRequest(format!("Unsupported scheme '{}'", s)))
            }
            None => {
                return Err(ProxyError::MalformedRequest(format!(
                    "Request target '{}' is not an absolute URI",
                    uri
                )))
            }
        };

        let host = uri
            .host()
            .map(strip_brackets)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ProxyError::MalformedRequest(format!("Request target '{}' has no host", uri)))?;

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/");

        // "http://host?x" has a path_and_query of "?x"
        let path_and_query = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{}", path_and_query)
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port: uri.port_u16().unwrap_or_else(|| scheme.default_port()),
            path_and_query,
        })
    }

    /// `host:port` to dial, bracketing IPv6 literals
    pub fn authority(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Value for the outbound `Host` header
    pub fn host_header(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

/// Parse a CONNECT authority into host and port
///
/// The port falls back to 443 when missing or not numeric. Bracketed IPv6
/// literals are accepted.
pub fn parse_authority(authority: &str) -> Result<(String, u16)> {
    let authority = authority.trim();

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| ProxyError::MalformedRequest(format!("Unterminated IPv6 literal in '{}'", authority)))?;
        (host, after.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            // A bare IPv6 literal has more than one colon and no port
            Some((host, _)) if host.contains(':') => (authority, None),
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(ProxyError::MalformedRequest(format!("CONNECT target '{}' has no host", authority)));
    }

    let port = port
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_TUNNEL_PORT);

    Ok((host.to_string(), port))
}

/// Join a host and port, bracketing IPv6 literals
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(uri: &str) -> Result<Target> {
        Target::from_uri(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_http_target() {
        let t = target("http://example.com/a/b?q=1").unwrap();
        assert_eq!(t.scheme, Scheme::Http);
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 80);
        assert_eq!(t.path_and_query, "/a/b?q=1");
        assert_eq!(t.authority(), "example.com:80");
        assert_eq!(t.host_header(), "example.com");
    }

    #[test]
    fn test_https_default_and_explicit_port() {
        assert_eq!(target("https://example.com").unwrap().port, 443);
        assert_eq!(target("https://example.com").unwrap().path_and_query, "/");
        assert_eq!(target("HTTP://example.com:8080/").unwrap().port, 8080);
    }

    #[test]
    fn test_ipv6_target() {
        let t = target("http://[::1]:8080/x").unwrap();
        assert_eq!(t.host, "::1");
        assert_eq!(t.authority(), "[::1]:8080");
        assert_eq!(t.host_header(), "[::1]");
    }

    #[test]
    fn test_malformed_targets() {
        assert!(matches!(target("/relative/path"), Err(ProxyError::MalformedRequest(_))));
        assert!(matches!(target("ftp://example.com/file"), Err(ProxyError::MalformedRequest(_))));
    }

    #[test]
    fn test_parse_authority() {
        assert_eq!(parse_authority("example.com:8443").unwrap(), ("example.com".into(), 8443));
        assert_eq!(parse_authority("example.com").unwrap(), ("example.com".into(), 443));
        assert_eq!(parse_authority("example.com:https").unwrap(), ("example.com".into(), 443));
        assert_eq!(parse_authority("[::1]:22").unwrap(), ("::1".into(), 22));
        assert_eq!(parse_authority("[::1]").unwrap(), ("::1".into(), 443));
        assert_eq!(parse_authority("::1").unwrap(), ("::1".into(), 443));
    }

    #[test]
    fn test_parse_authority_errors() {
        assert!(parse_authority("").is_err());
        assert!(parse_authority(":443").is_err());
        assert!(parse_authority("[::1").is_err());
    }
}
