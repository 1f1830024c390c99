//! Server stub for `thingapi.ThingRpc`.

use std::sync::Arc;

use tonic::codegen::{Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::NamedService;

use super::{Empty, Thing, ThingFindResponse, ThingId};
use crate::interceptor::rpc::TypedStream;
use crate::interceptor::{InterceptorChain, MethodInfo};

pub const SERVICE_NAME: &str = "thingapi.ThingRpc";

pub const THING_FIND_PATH: &str = "/thingapi.ThingRpc/ThingFind";
pub const THING_GET_PATH: &str = "/thingapi.ThingRpc/ThingGet";
pub const THING_SAVE_PATH: &str = "/thingapi.ThingRpc/ThingSave";
pub const THING_DELETE_PATH: &str = "/thingapi.ThingRpc/ThingDelete";
pub const THING_FIND_STREAM_PATH: &str = "/thingapi.ThingRpc/ThingFindStream";

pub const THING_FIND: MethodInfo = MethodInfo::unary(THING_FIND_PATH);
pub const THING_GET: MethodInfo = MethodInfo::unary(THING_GET_PATH);
pub const THING_SAVE: MethodInfo = MethodInfo::unary(THING_SAVE_PATH);
pub const THING_DELETE: MethodInfo = MethodInfo::unary(THING_DELETE_PATH);
pub const THING_FIND_STREAM: MethodInfo = MethodInfo::server_streaming(THING_FIND_STREAM_PATH);

/// Business logic behind `thingapi.ThingRpc`.
#[async_trait::async_trait]
pub trait ThingRpc: Send + Sync + 'static {
    async fn thing_find(
        &self,
        request: tonic::Request<Empty>,
    ) -> Result<tonic::Response<ThingFindResponse>, tonic::Status>;

    async fn thing_get(&self, request: tonic::Request<ThingId>) -> Result<tonic::Response<Thing>, tonic::Status>;

    async fn thing_save(&self, request: tonic::Request<Thing>) -> Result<tonic::Response<ThingId>, tonic::Status>;

    async fn thing_delete(&self, request: tonic::Request<ThingId>) -> Result<tonic::Response<Empty>, tonic::Status>;

    /// Response stream of `ThingFindStream`.
    type ThingFindStreamStream: futures_util::Stream<Item = Result<Thing, tonic::Status>> + Send + 'static;

    async fn thing_find_stream(
        &self,
        request: tonic::Request<Empty>,
    ) -> Result<tonic::Response<Self::ThingFindStreamStream>, tonic::Status>;
}

/// gRPC service for a [`ThingRpc`] implementation. Every call passes
/// through the attached interceptor chain.
pub struct ThingRpcServer<T: ThingRpc> {
    inner: Arc<T>,
    chain: Arc<InterceptorChain>,
}

impl<T: ThingRpc> ThingRpcServer<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self {
            inner,
            chain: Arc::new(InterceptorChain::default()),
        }
    }

    pub fn with_interceptors(mut self, chain: Arc<InterceptorChain>) -> Self {
        self.chain = chain;
        self
    }
}

impl<T: ThingRpc> Clone for ThingRpcServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<T: ThingRpc> NamedService for ThingRpcServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}

impl<T, B> Service<http::Request<B>> for ThingRpcServer<T>
where
    T: ThingRpc,
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
        let inner = Arc::clone(&self.inner);
        let chain = Arc::clone(&self.chain);

        match req.uri().path() {
            THING_FIND_PATH => {
                struct ThingFindSvc<T: ThingRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: ThingRpc> tonic::server::UnaryService<Empty> for ThingFindSvc<T> {
                    type Response = ThingFindResponse;
                    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<Empty>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .unary(&THING_FIND, request, move |request| async move {
                                    inner.thing_find(request).await
                                })
                                .await
                        })
                    }
                }
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(ThingFindSvc(inner, chain), req).await)
                })
            }
            THING_GET_PATH => {
                struct ThingGetSvc<T: ThingRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: ThingRpc> tonic::server::UnaryService<ThingId> for ThingGetSvc<T> {
                    type Response = Thing;
                    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<ThingId>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .unary(&THING_GET, request, move |request| async move {
                                    inner.thing_get(request).await
                                })
                                .await
                        })
                    }
                }
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(ThingGetSvc(inner, chain), req).await)
                })
            }
            THING_SAVE_PATH => {
                struct ThingSaveSvc<T: ThingRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: ThingRpc> tonic::server::UnaryService<Thing> for ThingSaveSvc<T> {
                    type Response = ThingId;
                    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<Thing>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .unary(&THING_SAVE, request, move |request| async move {
                                    inner.thing_save(request).await
                                })
                                .await
                        })
                    }
                }
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(ThingSaveSvc(inner, chain), req).await)
                })
            }
            THING_DELETE_PATH => {
                struct ThingDeleteSvc<T: ThingRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: ThingRpc> tonic::server::UnaryService<ThingId> for ThingDeleteSvc<T> {
                    type Response = Empty;
                    type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<ThingId>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .unary(&THING_DELETE, request, move |request| async move {
                                    inner.thing_delete(request).await
                                })
                                .await
                        })
                    }
                }
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.unary(ThingDeleteSvc(inner, chain), req).await)
                })
            }
            THING_FIND_STREAM_PATH => {
                struct ThingFindStreamSvc<T: ThingRpc>(Arc<T>, Arc<InterceptorChain>);
                impl<T: ThingRpc> tonic::server::ServerStreamingService<Empty> for ThingFindStreamSvc<T> {
                    type Response = Thing;
                    type ResponseStream = TypedStream<Thing>;
                    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                    fn call(&mut self, request: tonic::Request<Empty>) -> Self::Future {
                        let inner = Arc::clone(&self.0);
                        let chain = Arc::clone(&self.1);
                        Box::pin(async move {
                            chain
                                .server_streaming(&THING_FIND_STREAM, request, move |request| async move {
                                    inner.thing_find_stream(request).await
                                })
                                .await
                        })
                    }
                }
                Box::pin(async move {
                    let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                    Ok(grpc.server_streaming(ThingFindStreamSvc(inner, chain), req).await)
                })
            }
            _ => Box::pin(async move { Ok(super::unimplemented_response()) }),
        }
    }
}
