//! Interceptor chains for HTTP requests and RPC calls.
//!
//! # Data Flow
//! ```text
//! HTTP request ─→ http interceptors[0] → [1] → … → router / gateway
//! unary RPC    ─→ unary interceptors[0] → [1] → … → service method
//! stream RPC   ─→ stream interceptors[0] → [1] → … → service method
//! ```
//!
//! # Design Decisions
//! - Interceptors are trait objects held in ordered lists; the chain is
//!   built once and shared read-only through an `Arc`
//! - Each interceptor receives a `next` continuation, so it runs inward in
//!   registration order and sees the outcome in reverse order
//! - RPC messages are type-erased behind [`RpcMessage`] so one interceptor
//!   serves every method

pub mod http;
pub mod rpc;

use std::sync::Arc;

pub use self::http::{HttpInterceptor, HttpNext};
pub use self::rpc::{
    MessageStream, MethodInfo, MethodKind, RpcMessage, StreamInterceptor, StreamNext,
    UnaryInterceptor, UnaryNext,
};

/// Ordered interceptor lists for both protocols.
#[derive(Default, Clone)]
pub struct InterceptorChain {
    http: Vec<Arc<dyn HttpInterceptor>>,
    unary: Vec<Arc<dyn UnaryInterceptor>>,
    stream: Vec<Arc<dyn StreamInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an HTTP interceptor; it runs after those already added.
    pub fn with_http(mut self, interceptor: impl HttpInterceptor + 'static) -> Self {
        self.http.push(Arc::new(interceptor));
        self
    }

    /// Append a unary RPC interceptor.
    pub fn with_unary(mut self, interceptor: impl UnaryInterceptor + 'static) -> Self {
        self.unary.push(Arc::new(interceptor));
        self
    }

    /// Append a streaming RPC interceptor.
    pub fn with_stream(mut self, interceptor: impl StreamInterceptor + 'static) -> Self {
        self.stream.push(Arc::new(interceptor));
        self
    }

    pub fn http_interceptors(&self) -> &[Arc<dyn HttpInterceptor>] {
        &self.http
    }

    pub fn unary_interceptors(&self) -> &[Arc<dyn UnaryInterceptor>] {
        &self.unary
    }

    pub fn stream_interceptors(&self) -> &[Arc<dyn StreamInterceptor>] {
        &self.stream
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.unary.is_empty() && self.stream.is_empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("http", &self.http.len())
            .field("unary", &self.unary.len())
            .field("stream", &self.stream.len())
            .finish()
    }
}
