//! Persistence of things.
//!
//! # Responsibilities
//! - Define the store contract the RPC layer depends on
//! - Select the backend from configuration in one place
//!
//! # Design Decisions
//! - The contract is a trait object (`Arc<dyn ThingStore>`), so the RPC
//!   layer never knows which backend is in use
//! - "Not found" is the only failure callers branch on; everything else is
//!   an opaque backend error

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageConfig, StorageKind};
use crate::proto::Thing;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistent collection of things.
#[async_trait]
pub trait ThingStore: Send + Sync + 'static {
    /// Every stored thing.
    async fn find(&self) -> Result<Vec<Thing>, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Thing, StoreError>;

    /// Insert or replace a thing, generating an id when it has none.
    /// Returns the id the thing was stored under.
    async fn save(&self, thing: Thing) -> Result<String, StoreError>;

    /// Remove a thing. Removing an absent id succeeds.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}

/// Open the configured store backend.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn ThingStore>, StoreError> {
    match config.kind {
        StorageKind::Memory => {
            tracing::info!(storage = "memory", "Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageKind::Postgres => Ok(Arc::new(PostgresStore::connect(config).await?)),
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
