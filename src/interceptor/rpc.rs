//! Unary and server-streaming RPC interceptors.
//!
//! Service stubs call [`InterceptorChain::unary`] / [`InterceptorChain::server_streaming`]
//! with their typed handler. The chain erases the message types, runs every
//! interceptor, and restores the types before returning to the stub.

use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tonic::{Request, Response, Status};

use super::InterceptorChain;

/// A request or response message seen by interceptors.
pub trait RpcMessage: Any + Send + Sync + Debug {
    /// JSON rendering of the message, `None` if it cannot be serialized.
    fn capture(&self) -> Option<serde_json::Value>;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T> RpcMessage for T
where
    T: Serialize + Debug + Send + Sync + 'static,
{
    fn capture(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ServerStreaming,
}

/// Static description of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo {
    /// Full method name, `/package.Service/Method`.
    pub full_method: &'static str,
    pub kind: MethodKind,
}

impl MethodInfo {
    pub const fn unary(full_method: &'static str) -> Self {
        Self {
            full_method,
            kind: MethodKind::Unary,
        }
    }

    pub const fn server_streaming(full_method: &'static str) -> Self {
        Self {
            full_method,
            kind: MethodKind::ServerStreaming,
        }
    }

    /// `package.Service` part of the full method name.
    pub fn service(&self) -> &'static str {
        split_method(self.full_method).0
    }

    /// `Method` part of the full method name.
    pub fn method(&self) -> &'static str {
        split_method(self.full_method).1
    }
}

fn split_method(full_method: &str) -> (&str, &str) {
    full_method
        .trim_start_matches('/')
        .split_once('/')
        .unwrap_or((full_method, ""))
}

pub type ErasedRequest = Request<Box<dyn RpcMessage>>;
pub type UnaryResult = Result<Response<Box<dyn RpcMessage>>, Status>;
pub type UnaryHandler = Box<dyn FnOnce(ErasedRequest) -> BoxFuture<'static, UnaryResult> + Send>;

pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Box<dyn RpcMessage>, Status>> + Send>>;
pub type StreamResult = Result<Response<MessageStream>, Status>;
pub type StreamHandler = Box<dyn FnOnce(ErasedRequest) -> BoxFuture<'static, StreamResult> + Send>;

/// Typed stream handed back to a server-streaming stub.
pub type TypedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Wraps every unary call.
#[async_trait]
pub trait UnaryInterceptor: Send + Sync {
    async fn intercept(&self, info: &MethodInfo, request: ErasedRequest, next: UnaryNext<'_>) -> UnaryResult;
}

/// Wraps every server-streaming call. The call completes when the returned
/// stream finishes, not when `intercept` returns.
#[async_trait]
pub trait StreamInterceptor: Send + Sync {
    async fn intercept(&self, info: &MethodInfo, request: ErasedRequest, next: StreamNext<'_>) -> StreamResult;
}

/// The remainder of a unary chain, ending in the service method.
pub struct UnaryNext<'a> {
    rest: &'a [std::sync::Arc<dyn UnaryInterceptor>],
    handler: UnaryHandler,
}

impl UnaryNext<'_> {
    pub async fn run(self, info: &MethodInfo, request: ErasedRequest) -> UnaryResult {
        match self.rest.split_first() {
            Some((first, rest)) => {
                let next = UnaryNext {
                    rest,
                    handler: self.handler,
                };
                first.intercept(info, request, next).await
            }
            None => (self.handler)(request).await,
        }
    }
}

/// The remainder of a streaming chain, ending in the service method.
pub struct StreamNext<'a> {
    rest: &'a [std::sync::Arc<dyn StreamInterceptor>],
    handler: StreamHandler,
}

impl StreamNext<'_> {
    pub async fn run(self, info: &MethodInfo, request: ErasedRequest) -> StreamResult {
        match self.rest.split_first() {
            Some((first, rest)) => {
                let next = StreamNext {
                    rest,
                    handler: self.handler,
                };
                first.intercept(info, request, next).await
            }
            None => (self.handler)(request).await,
        }
    }
}

impl InterceptorChain {
    /// Run a unary call through the unary interceptors.
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        info: &MethodInfo,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
        F: FnOnce(Request<Req>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response<Resp>, Status>> + Send + 'static,
    {
        let handler: UnaryHandler = Box::new(move |request: ErasedRequest| -> BoxFuture<'static, UnaryResult> {
            Box::pin(async move {
                let response = handler(restore_request(request)?).await?;
                Ok(erase_response(response))
            })
        });
        let next = UnaryNext {
            rest: self.unary_interceptors(),
            handler,
        };
        restore_response(next.run(info, erase_request(request)).await?)
    }

    /// Run a server-streaming call through the stream interceptors.
    pub async fn server_streaming<Req, Resp, S, F, Fut>(
        &self,
        info: &MethodInfo,
        request: Request<Req>,
        handler: F,
    ) -> Result<Response<TypedStream<Resp>>, Status>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
        F: FnOnce(Request<Req>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Response<S>, Status>> + Send + 'static,
    {
        let handler: StreamHandler = Box::new(move |request: ErasedRequest| -> BoxFuture<'static, StreamResult> {
            Box::pin(async move {
                let response = handler(restore_request(request)?).await?;
                let (metadata, stream, extensions) = response.into_parts();
                let stream: MessageStream = Box::pin(
                    stream.map(|item| item.map(|message| Box::new(message) as Box<dyn RpcMessage>)),
                );
                Ok(Response::from_parts(metadata, stream, extensions))
            })
        });
        let next = StreamNext {
            rest: self.stream_interceptors(),
            handler,
        };
        let (metadata, stream, extensions) = next.run(info, erase_request(request)).await?.into_parts();
        let stream: TypedStream<Resp> =
            Box::pin(stream.map(|item| item.and_then(|message| restore_message::<Resp>(message))));
        Ok(Response::from_parts(metadata, stream, extensions))
    }
}

fn erase_request<T: RpcMessage>(request: Request<T>) -> ErasedRequest {
    let (metadata, extensions, message) = request.into_parts();
    Request::from_parts(metadata, extensions, Box::new(message) as Box<dyn RpcMessage>)
}

fn erase_response<T: RpcMessage>(response: Response<T>) -> Response<Box<dyn RpcMessage>> {
    let (metadata, message, extensions) = response.into_parts();
    Response::from_parts(metadata, Box::new(message) as Box<dyn RpcMessage>, extensions)
}

fn restore_request<T: RpcMessage>(request: ErasedRequest) -> Result<Request<T>, Status> {
    let (metadata, extensions, message) = request.into_parts();
    Ok(Request::from_parts(metadata, extensions, restore_message(message)?))
}

fn restore_response<T: RpcMessage>(response: Response<Box<dyn RpcMessage>>) -> Result<Response<T>, Status> {
    let (metadata, message, extensions) = response.into_parts();
    Ok(Response::from_parts(metadata, restore_message(message)?, extensions))
}

fn restore_message<T: RpcMessage>(message: Box<dyn RpcMessage>) -> Result<T, Status> {
    message
        .into_any()
        .downcast::<T>()
        .map(|message| *message)
        .map_err(|_| Status::internal("interceptor replaced message with a different type"))
}
