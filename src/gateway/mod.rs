//! REST gateway bridged onto the RPC services.
//!
//! # Data Flow
//! ```text
//! HTTP router (no native route matched)
//!     → gateway mux (axum Router merged from every registration)
//!     → handler: decode JSON, build RPC request with gateway metadata
//!     → tonic client over loopback (TLS when the listener uses TLS)
//!     → same listener → multiplexer → RPC service
//! ```
//!
//! # Design Decisions
//! - Registrations run at listen time, once the bound address and the trust
//!   anchor are known
//! - The loopback channel connects lazily, so registering does not wait for
//!   the server to accept
//! - Every bridged call carries the `grpcgateway` marker so RPC logging
//!   skips it; the HTTP record already covers it

pub mod marshal;
pub mod thing;
pub mod version;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::Router;
use http::HeaderMap;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::http::request::{peer_addr, GATEWAY_MARKER, X_FORWARDED_FOR};
use crate::net::TrustAnchor;

pub use marshal::{EnumField, GatewayMessage, JsonMarshaler, MarshalError};

/// A deferred gateway registration, invoked once at listen time.
pub type GatewayRegistration = Box<dyn FnOnce(&GatewayContext) -> Result<Router, GatewayError> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid loopback endpoint: {0}")]
    Endpoint(#[from] tonic::transport::Error),

    #[error("gateway registration {name} failed: {message}")]
    Registration { name: &'static str, message: String },
}

/// What a registration needs to reach the RPC services.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    endpoint: Endpoint,
    marshaler: JsonMarshaler,
}

impl GatewayContext {
    /// Loopback endpoint for a server bound at `local_addr`. With a trust
    /// anchor the endpoint uses TLS and verifies against the anchor's
    /// certificate under its common name.
    pub fn new(
        local_addr: SocketAddr,
        trust: Option<&TrustAnchor>,
        marshaler: JsonMarshaler,
    ) -> Result<Self, GatewayError> {
        let target = loopback(local_addr);
        let endpoint = match trust {
            Some(anchor) => {
                let tls = ClientTlsConfig::new()
                    .ca_certificate(tonic::transport::Certificate::from_pem(anchor.leaf_pem()))
                    .domain_name(anchor.common_name());
                Endpoint::from_shared(format!("https://{target}"))?.tls_config(tls)?
            }
            None => Endpoint::from_shared(format!("http://{target}"))?,
        };
        Ok(Self { endpoint, marshaler })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Channel to the local RPC server. It connects on first use.
    pub fn channel(&self) -> Channel {
        self.endpoint.connect_lazy()
    }

    pub fn marshaler(&self) -> JsonMarshaler {
        self.marshaler
    }
}

/// Address the gateway dials: the bound address, with a wildcard host
/// replaced by the loopback address of the same family.
pub fn loopback(local_addr: SocketAddr) -> SocketAddr {
    let ip = match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, local_addr.port())
}

/// Wrap `message` in an RPC request carrying the gateway marker and the
/// caller's forwarded headers.
pub fn outgoing<T>(message: T, headers: &HeaderMap, extensions: &http::Extensions) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    forward_metadata(request.metadata_mut(), headers, extensions);
    request
}

/// Caller headers copied into RPC metadata.
const FORWARDED_HEADERS: [&str; 3] = ["x-request-id", "authorization", "x-forwarded-for"];

fn forward_metadata(metadata: &mut MetadataMap, headers: &HeaderMap, extensions: &http::Extensions) {
    metadata.insert(GATEWAY_MARKER, AsciiMetadataValue::from_static("1"));

    for name in FORWARDED_HEADERS {
        if let Some(value) = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<AsciiMetadataValue>().ok())
        {
            metadata.insert(name, value);
        }
    }

    if !metadata.contains_key(X_FORWARDED_FOR.as_str()) {
        if let Some(value) = peer_addr(extensions)
            .and_then(|peer| peer.ip().to_string().parse::<AsciiMetadataValue>().ok())
        {
            metadata.insert("x-forwarded-for", value);
        }
    }
}
