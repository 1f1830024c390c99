//! HTTP interceptors, run as a single axum middleware.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::InterceptorChain;

/// Wraps the handling of every HTTP request that reaches the HTTP router.
#[async_trait]
pub trait HttpInterceptor: Send + Sync {
    async fn intercept(&self, request: Request, next: HttpNext<'_>) -> Response;
}

/// The remainder of the HTTP chain, ending in the router.
pub struct HttpNext<'a> {
    rest: &'a [Arc<dyn HttpInterceptor>],
    inner: Next,
}

impl<'a> HttpNext<'a> {
    pub fn new(rest: &'a [Arc<dyn HttpInterceptor>], inner: Next) -> Self {
        Self { rest, inner }
    }

    /// Hand the request to the next interceptor, or to the router.
    pub async fn run(self, request: Request) -> Response {
        match self.rest.split_first() {
            Some((first, rest)) => {
                first
                    .intercept(request, HttpNext { rest, inner: self.inner })
                    .await
            }
            None => self.inner.run(request).await,
        }
    }
}

/// axum middleware running the chain's HTTP interceptors in order.
///
/// Install with `axum::middleware::from_fn_with_state(chain, run_http_chain)`.
pub async fn run_http_chain(
    State(chain): State<Arc<InterceptorChain>>,
    request: Request,
    next: Next,
) -> Response {
    HttpNext::new(chain.http_interceptors(), next).run(request).await
}
