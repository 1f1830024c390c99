//! RPC services and their wiring into the server.
//!
//! # Data Flow
//! ```text
//! ThingRpcServer / VersionRpcServer (interceptors attached)
//!     → ThingService → ThingStore
//!     → VersionService
//! ```

pub mod thing;
pub mod version;

use std::sync::Arc;

use axum::routing::get;
use axum::Json;
use serde_json::json;

use crate::gateway;
use crate::http::Server;
use crate::proto::{ThingRpcServer, VersionRpcServer};
use crate::store::ThingStore;

pub use thing::ThingService;
pub use version::{VersionService, VERSION};

/// Register the health route, both RPC services and their gateways.
pub fn setup_routes(server: &mut Server, store: Arc<dyn ThingStore>) {
    let chain = server.interceptors();

    server
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .add_service(ThingRpcServer::new(ThingService::new(store)).with_interceptors(Arc::clone(&chain)))
        .add_service(VersionRpcServer::new(VersionService).with_interceptors(chain))
        .register_gateway(gateway::thing::register)
        .register_gateway(gateway::version::register);
}
