//! In-memory store, used by default and in tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{new_id, StoreError, ThingStore};
use crate::proto::Thing;

/// Things kept in a map ordered by id. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    things: RwLock<BTreeMap<String, Thing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl ThingStore for MemoryStore {
    async fn find(&self) -> Result<Vec<Thing>, StoreError> {
        let things = self.things.read().map_err(|_| Self::poisoned())?;
        Ok(things.values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Thing, StoreError> {
        let things = self.things.read().map_err(|_| Self::poisoned())?;
        things.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn save(&self, mut thing: Thing) -> Result<String, StoreError> {
        if thing.id.is_empty() {
            thing.id = new_id();
        }
        let id = thing.id.clone();
        self.things
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(id.clone(), thing);
        Ok(id)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.things.write().map_err(|_| Self::poisoned())?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thing(id: &str, name: &str) -> Thing {
        Thing {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn save_generates_id_and_get_returns_it() {
        let store = MemoryStore::new();
        let id = store.save(thing("", "widget")).await.unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let stored = store.get_by_id(&id).await.unwrap();
        assert_eq!(stored, thing(&id, "widget"));
    }

    #[tokio::test]
    async fn save_with_id_upserts() {
        let store = MemoryStore::new();
        store.save(thing("a", "first")).await.unwrap();
        store.save(thing("a", "second")).await.unwrap();

        let all = store.find().await.unwrap();
        assert_eq!(all, vec![thing("a", "second")]);
    }

    #[tokio::test]
    async fn missing_thing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get_by_id("nope").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.save(thing("a", "x")).await.unwrap();
        store.delete_by_id("a").await.unwrap();
        store.delete_by_id("a").await.unwrap();
        assert!(store.find().await.unwrap().is_empty());
    }
}
