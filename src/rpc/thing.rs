//! `thingapi.ThingRpc` backed by a [`ThingStore`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tonic::{Request, Response, Status};

use crate::interceptor::rpc::TypedStream;
use crate::proto::{Empty, Thing, ThingFindResponse, ThingId, ThingRpc};
use crate::store::{StoreError, ThingStore};

pub struct ThingService {
    store: Arc<dyn ThingStore>,
}

impl ThingService {
    pub fn new(store: Arc<dyn ThingStore>) -> Self {
        Self { store }
    }
}

/// Store failure as returned to callers. Backend detail stays in the log.
fn to_status(err: StoreError) -> Status {
    match err {
        StoreError::NotFound => Status::not_found("Not Found"),
        StoreError::Backend(detail) => {
            tracing::error!(error = %detail, "Store operation failed");
            Status::internal("internal error")
        }
    }
}

fn require_id(id: &str) -> Result<(), Status> {
    if id.is_empty() {
        return Err(Status::invalid_argument("id is required"));
    }
    Ok(())
}

#[async_trait]
impl ThingRpc for ThingService {
    async fn thing_find(&self, _request: Request<Empty>) -> Result<Response<ThingFindResponse>, Status> {
        let data = self.store.find().await.map_err(to_status)?;
        Ok(Response::new(ThingFindResponse { data }))
    }

    async fn thing_get(&self, request: Request<ThingId>) -> Result<Response<Thing>, Status> {
        let ThingId { id } = request.into_inner();
        require_id(&id)?;
        let thing = self.store.get_by_id(&id).await.map_err(to_status)?;
        Ok(Response::new(thing))
    }

    async fn thing_save(&self, request: Request<Thing>) -> Result<Response<ThingId>, Status> {
        let id = self.store.save(request.into_inner()).await.map_err(to_status)?;
        Ok(Response::new(ThingId { id }))
    }

    async fn thing_delete(&self, request: Request<ThingId>) -> Result<Response<Empty>, Status> {
        let ThingId { id } = request.into_inner();
        require_id(&id)?;
        self.store.delete_by_id(&id).await.map_err(to_status)?;
        Ok(Response::new(()))
    }

    type ThingFindStreamStream = TypedStream<Thing>;

    async fn thing_find_stream(&self, _request: Request<Empty>) -> Result<Response<Self::ThingFindStreamStream>, Status> {
        let things = self.store.find().await.map_err(to_status)?;
        Ok(Response::new(Box::pin(stream::iter(things.into_iter().map(Ok)))))
    }
}
