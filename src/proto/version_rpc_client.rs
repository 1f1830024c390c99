//! Client stub for `thingapi.VersionRpc`.

use tonic::codegen::{Body, Bytes, StdError};

use super::version_rpc_server::VERSION_PATH;
use super::{Empty, VersionResponse};

#[derive(Debug, Clone)]
pub struct VersionRpcClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl VersionRpcClient<tonic::transport::Channel> {
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<tonic::transport::Endpoint>,
        D::Error: Into<StdError>,
    {
        let channel = tonic::transport::Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(channel))
    }
}

impl<T> VersionRpcClient<T>
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

    pub async fn version(
        &mut self,
        request: impl tonic::IntoRequest<Empty>,
    ) -> Result<tonic::Response<VersionResponse>, tonic::Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e.into())))?;
        let path = http::uri::PathAndQuery::from_static(VERSION_PATH);
        self.inner
            .unary(request.into_request(), path, tonic::codec::ProstCodec::default())
            .await
    }
}
