//! Server stub for `thingapi.VersionRpc`.

use std::sync::Arc;

use tonic::codegen::{Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::NamedService;

use super::{Empty, VersionResponse};
use crate::interceptor::{InterceptorChain, MethodInfo};

pub const SERVICE_NAME: &str = "thingapi.VersionRpc";

pub const VERSION_PATH: &str = "/thingapi.VersionRpc/Version";
pub const VERSION: MethodInfo = MethodInfo::unary(VERSION_PATH);

#[async_trait::async_trait]
pub trait VersionRpc: Send + Sync + 'static {
    async fn version(&self, request: tonic::Request<Empty>) -> Result<tonic::Response<VersionResponse>, tonic::Status>;
}

pub struct VersionRpcServer<T: VersionRpc> {
    inner: Arc<T>,
    chain: Arc<InterceptorChain>,
}

impl<T: VersionRpc> VersionRpcServer<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(inner),
            chain: Arc::new(InterceptorChain::default()),
        }
    }

    pub fn with_interceptors(mut self, chain: Arc<InterceptorChain>) -> Self {
        self.chain = chain;
        self
    }
}

impl<T: VersionRpc> Clone for VersionRpcServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<T: VersionRpc> NamedService for VersionRpcServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}

impl<T, B> Service<http::Request<B>> for VersionRpcServer<T>
where
    T: VersionRpc,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            VERSION_PATH => {
                struct VersionSvc<T: VersionRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: VersionRpc> tonic::server::UnaryService<Empty> for VersionSvc<T> {
                    type Response = VersionResponse;
                    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<Empty>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .unary(&VERSION, request, move |request| async move {
                                    inner.version(request).await
                                })
                                .await
                        })
                    }
                }
                let svc = VersionSvc(Arc::clone(&self.inner), Arc::clone(&self.chain));
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(svc, req).await)
                })
            }
            _ => Box::pin(async move { Ok(super::unimplemented_response()) }),
        }
    }
}
