//! API server: one listener serving gRPC and REST.
//!
//! # Responsibilities
//! - Collect native HTTP routes, RPC services and gateway registrations
//! - Bind the listener and produce TLS material when enabled
//! - Build the gateway against the bound address and merge it under the
//!   HTTP router
//! - Accept connections and serve HTTP/1.1 and HTTP/2 on each
//!
//! # Design Decisions
//! - Two phases: a mutable `Server` while routes are added, then
//!   `listen_and_serve(self)` consumes it and returns a `ListeningServer`
//! - Timeouts and body limits apply to the HTTP router only; RPC streams
//!   are not cut off
//! - Each connection carries its peer address as a `ConnectInfo` extension

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tonic::server::NamedService;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::{AppConfig, HttpConfig, ListenerConfig, RestConfig};
use crate::gateway::{GatewayContext, GatewayError, GatewayRegistration, JsonMarshaler};
use crate::http::dispatch::{Multiplexer, RpcRoutes};
use crate::http::response::not_found;
use crate::interceptor::http::run_http_chain;
use crate::interceptor::InterceptorChain;
use crate::net::{tls, AcceptRecovery, ConnectionTracker, Listener, ListenerError, TlsError, TrustAnchor};

type AppService = BoxCloneSyncService<http::Request<Body>, Response, Infallible>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server under construction.
pub struct Server {
    listener: ListenerConfig,
    http: HttpConfig,
    rest: RestConfig,
    chain: Arc<InterceptorChain>,
    routes: Router,
    rpc: RpcRoutes,
    gateways: Vec<GatewayRegistration>,
}

impl Server {
    pub fn new(config: &AppConfig, chain: InterceptorChain) -> Self {
        Self {
            listener: config.listener.clone(),
            http: config.http.clone(),
            rest: config.rest,
            chain: Arc::new(chain),
            routes: Router::new(),
            rpc: RpcRoutes::new(),
            gateways: Vec::new(),
        }
    }

    /// The interceptor chain RPC services should be built with.
    pub fn interceptors(&self) -> Arc<InterceptorChain> {
        Arc::clone(&self.chain)
    }

    /// Add a native HTTP route. Native routes take precedence over the gateway.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        self.routes = std::mem::take(&mut self.routes).route(path, method_router);
        self
    }

    /// Register a gRPC service, dispatched by its service name.
    pub fn add_service<S>(&mut self, service: S) -> &mut Self
    where
        S: Service<http::Request<Body>, Response = http::Response<tonic::body::BoxBody>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        tracing::debug!(service = S::NAME, "gRPC service registered");
        self.rpc.add(service);
        self
    }

    /// Record a gateway registration. It runs during `listen_and_serve`,
    /// in registration order.
    pub fn register_gateway<F>(&mut self, registration: F) -> &mut Self
    where
        F: FnOnce(&GatewayContext) -> Result<Router, GatewayError> + Send + 'static,
    {
        self.gateways.push(Box::new(registration));
        self
    }

    /// Bind, finish setup and start accepting connections in the background.
    pub async fn listen_and_serve(self) -> Result<ListeningServer, ServerError> {
        let listener = Listener::bind(&self.listener).await?;
        let local_addr = listener.local_addr()?;

        let (acceptor, trust) = if self.listener.tls {
            let certificate = tls::load_or_generate(&self.listener)?;
            let trust = tls::derive_trust_anchor(&certificate)?;
            let acceptor = TlsAcceptor::from(tls::server_config(&certificate)?);
            (Some(acceptor), Some(trust))
        } else {
            (None, None)
        };

        let context = GatewayContext::new(local_addr, trust.as_ref(), JsonMarshaler::from(self.rest))?;
        let mut gateway = Router::new();
        for registration in self.gateways {
            gateway = gateway.merge(registration(&context)?);
        }
        let gateway = gateway.fallback(not_found);

        let http = http_router(self.routes, gateway, &self.http, Arc::clone(&self.chain));
        let app: AppService = BoxCloneSyncService::new(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .service(Multiplexer::new(self.rpc, http)),
        );

        let tracker = Arc::new(ConnectionTracker::new());
        let task = tokio::spawn(accept_loop(listener, acceptor, app, Arc::clone(&tracker)));

        tracing::info!(
            address = %local_addr,
            tls = self.listener.tls,
            "API Listening"
        );

        Ok(ListeningServer {
            local_addr,
            trust,
            tracker,
            task,
        })
    }
}

/// Native routes, then the gateway, behind the HTTP interceptors and limits.
#[allow(deprecated)]
fn http_router(routes: Router, gateway: Router, config: &HttpConfig, chain: Arc<InterceptorChain>) -> Router {
    routes
        .fallback_service(gateway)
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(axum::middleware::from_fn_with_state(chain, run_http_chain))
}

/// A running server.
#[derive(Debug)]
pub struct ListeningServer {
    local_addr: SocketAddr,
    trust: Option<TrustAnchor>,
    tracker: Arc<ConnectionTracker>,
    task: JoinHandle<()>,
}

impl ListeningServer {
    /// Bound address, with the real port when port zero was configured.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_tls(&self) -> bool {
        self.trust.is_some()
    }

    /// Certificate clients must trust when TLS is enabled.
    pub fn trust_anchor(&self) -> Option<&TrustAnchor> {
        self.trust.as_ref()
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting connections. Connections already open are served
    /// until their tasks finish.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

/// Pause after running out of descriptors before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

async fn accept_loop(
    listener: Listener,
    acceptor: Option<TlsAcceptor>,
    app: AppService,
    tracker: Arc<ConnectionTracker>,
) {
    loop {
        let (stream, peer, permit) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => match e.recovery() {
                AcceptRecovery::Retry => {
                    tracing::debug!(error = %e, "Accept failed for one connection");
                    continue;
                }
                AcceptRecovery::Backoff => {
                    tracing::warn!(error = %e, "Accept failed, retrying shortly");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
                AcceptRecovery::Fatal => {
                    tracing::error!(error = %e, "API Listener error");
                    std::process::exit(1);
                }
            },
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        let guard = tracker.track(peer);
        tokio::spawn(async move {
            let _permit = permit;
            tracing::trace!(connection = %guard.id(), peer = %peer, "Connection opened");
            match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => serve_connection(stream, peer, app).await,
                    Err(e) => tracing::debug!(peer = %peer, error = %e, "TLS handshake failed"),
                },
                None => serve_connection(stream, peer, app).await,
            }
            tracing::trace!(connection = %guard.id(), "Connection closed");
        });
    }
}

async fn serve_connection<I>(io: I, peer: SocketAddr, app: AppService)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut request: http::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request.map(Body::new))
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(io), service)
        .await
    {
        tracing::debug!(peer = %peer, error = %e, "Connection error");
    }
}
