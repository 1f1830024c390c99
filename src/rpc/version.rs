//! `thingapi.VersionRpc`: reports the running build.

use async_trait::async_trait;
use tonic::{Request, Response, Status};

use crate::proto::{Empty, VersionResponse, VersionRpc};

/// Version of this build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
pub struct VersionService;

#[async_trait]
impl VersionRpc for VersionService {
    async fn version(&self, _request: Request<Empty>) -> Result<Response<VersionResponse>, Status> {
        Ok(Response::new(VersionResponse {
            version: VERSION.to_string(),
        }))
    }
}
