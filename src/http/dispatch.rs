//! Protocol multiplexer.
//!
//! # Responsibilities
//! - Classify each request as gRPC or plain HTTP
//! - Hand gRPC requests to the registered service by name
//! - Hand everything else to the HTTP router
//!
//! # Design Decisions
//! - A request is gRPC when it is HTTP/2 and its content type contains
//!   `application/grpc`; cleartext HTTP/2 without that content type goes to
//!   the HTTP router
//! - Unknown gRPC services get an UNIMPLEMENTED status, never the HTTP 404

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, Request, Version};
use tonic::server::NamedService;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

/// Type-erased gRPC service.
pub type RpcService = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// True when the request must be served by the gRPC side.
pub fn is_rpc_request(version: Version, headers: &HeaderMap) -> bool {
    version == Version::HTTP_2
        && headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.contains("application/grpc"))
}

/// gRPC services keyed by their full service name.
#[derive(Clone, Default)]
pub struct RpcRoutes {
    services: HashMap<&'static str, RpcService>,
}

impl RpcRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generated service. A later service with the same name
    /// replaces the earlier one.
    pub fn add<S>(&mut self, service: S)
    where
        S: Service<Request<Body>, Response = http::Response<tonic::body::BoxBody>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let service = service.map_response(|response: http::Response<tonic::body::BoxBody>| response.map(Body::new));
        if self.services.insert(S::NAME, BoxCloneSyncService::new(service)).is_some() {
            tracing::warn!(service = S::NAME, "gRPC service registered twice, keeping the last one");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    fn route(&self, path: &str) -> Option<RpcService> {
        let name = path.trim_start_matches('/').split('/').next()?;
        self.services.get(name).cloned()
    }
}

/// Service in front of both protocols on one connection.
#[derive(Clone)]
pub struct Multiplexer {
    rpc: Arc<RpcRoutes>,
    http: Router,
}

impl Multiplexer {
    pub fn new(rpc: RpcRoutes, http: Router) -> Self {
        Self {
            rpc: Arc::new(rpc),
            http,
        }
    }
}

impl Service<Request<Body>> for Multiplexer {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if !is_rpc_request(request.version(), request.headers()) {
            return Box::pin(self.http.clone().oneshot(request));
        }
        match self.rpc.route(request.uri().path()) {
            Some(service) => Box::pin(service.oneshot(request)),
            None => {
                tracing::debug!(path = %request.uri().path(), "No gRPC service for path");
                Box::pin(async { Ok(crate::proto::unimplemented_response().map(Body::new)) })
            }
        }
    }
}
