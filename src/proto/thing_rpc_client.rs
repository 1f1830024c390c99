//! Client stub for `thingapi.ThingRpc`.

use tonic::codegen::{Body, Bytes, StdError};

use super::thing_rpc_server::{
    THING_DELETE_PATH, THING_FIND_PATH, THING_FIND_STREAM_PATH, THING_GET_PATH, THING_SAVE_PATH,
};
use super::{Empty, Thing, ThingFindResponse, ThingId};

#[derive(Debug, Clone)]
pub struct ThingRpcClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl ThingRpcClient<tonic::transport::Channel> {
    /// Connect to `dst` eagerly.
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let channel = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(channel))
    }
}

impl<T> ThingRpcClient<T>
where
    T: tonic::client::GrpcService<tonic::body::BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    async fn ready(&mut self) -> Result<(), tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e.into())))
    }

    pub async fn thing_find(
        &mut self,
        request: impl tonic::IntoRequest<Empty>,
    ) -> Result<tonic::Response<ThingFindResponse>, tonic::Status> {
        self.ready().await?;
        let path = http::uri::PathAndQuery::from_static(THING_FIND_PATH);
        self.inner
            .unary(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }

    pub async fn thing_get(
        &mut self,
        request: impl tonic::IntoRequest<ThingId>,
    ) -> Result<tonic::Response<Thing>, tonic::Status> {
        self.ready().await?;
        let path = http::uri::PathAndQuery::from_static(THING_GET_PATH);
        self.inner
            .unary(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }

    pub async fn thing_save(
        &mut self,
        request: impl tonic::IntoRequest<Thing>,
    ) -> Result<tonic::Response<ThingId>, tonic::Status> {
        self.ready().await?;
        let path = http::uri::PathAndQuery::from_static(THING_SAVE_PATH);
        self.inner
            .unary(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }

    pub async fn thing_delete(
        &mut self,
        request: impl tonic::IntoRequest<ThingId>,
    ) -> Result<tonic::Response<Empty>, tonic::Status> {
        self.ready().await?;
        let path = http::uri::PathAndQuery::from_static(THING_DELETE_PATH);
        self.inner
            .unary(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }

    pub async fn thing_find_stream(
        &mut self,
        request: impl tonic::IntoRequest<Empty>,
    ) -> Result<tonic::Response<tonic::codec::Streaming<Thing>>, tonic::Status> {
        self.ready().await?;
        let path = http::uri::PathAndQuery::from_static(THING_FIND_STREAM_PATH);
        self.inner
            .server_streaming(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }
}
