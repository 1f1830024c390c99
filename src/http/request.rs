//! Request metadata shared by the HTTP router, the RPC server and the gateway.
//!
//! # Responsibilities
//! - Name the headers every layer agrees on (request ID, forwarding, gateway marker)
//! - Resolve the caller's address, preferring `x-forwarded-for`
//!
//! # Design Decisions
//! - The peer address travels as a `ConnectInfo<SocketAddr>` request
//!   extension inserted per connection, so HTTP handlers and RPC
//!   interceptors read it the same way

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use http::{HeaderMap, HeaderName};

/// Request correlation header, assigned at the multiplexer when absent.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Original client address when behind a proxy or the gateway.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Metadata key marking RPC calls made by the gateway bridge. Only its
/// presence matters.
pub const GATEWAY_MARKER: &str = "grpcgateway";

/// Request ID from the headers, if any.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    header_str(headers, &X_REQUEST_ID)
}

/// Caller address: `x-forwarded-for` when present, the socket peer otherwise.
pub fn remote_addr(headers: &HeaderMap, extensions: &http::Extensions) -> Option<String> {
    header_str(headers, &X_FORWARDED_FOR)
        .or_else(|| peer_addr(extensions).map(|addr| addr.to_string()))
}

/// Socket peer recorded for the connection.
pub fn peer_addr(extensions: &http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// True when reading a body failed because it went past a length limit,
/// either the router's body limit or the one passed to `to_bytes`.
pub fn is_body_too_large(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(error) = source {
        if error.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = error.source();
    }
    false
}

pub(crate) fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut extensions = http::Extensions::new();
        extensions.insert(ConnectInfo("10.1.2.3:4000".parse::<SocketAddr>().unwrap()));

        let mut headers = HeaderMap::new();
        assert_eq!(remote_addr(&headers, &extensions).as_deref(), Some("10.1.2.3:4000"));

        headers.insert(X_FORWARDED_FOR, "203.0.113.9".parse().unwrap());
        assert_eq!(remote_addr(&headers, &extensions).as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn length_limit_errors_are_recognized() {
        let error = axum::body::to_bytes(axum::body::Body::from("too long"), 3)
            .await
            .unwrap_err();
        assert!(is_body_too_large(&error));

        let error = axum::Error::new(std::io::Error::other("reset"));
        assert!(!is_body_too_large(&error));
    }

    #[test]
    fn missing_everything_is_none() {
        assert_eq!(remote_addr(&HeaderMap::new(), &http::Extensions::new()), None);
        assert_eq!(request_id(&HeaderMap::new()), None);
    }
}
