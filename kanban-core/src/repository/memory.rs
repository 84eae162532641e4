//! In-memory implementations
//!
//! Stand-ins for a backend during tests and for state that is never
//! persisted (boards and teams).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::traits::{KeyValueStore, Repository};
use crate::domain::{DomainError, DomainResult, Entity};

/// Vec-backed repository keeping insertion order
pub struct InMemoryRepository<T> {
    items: RwLock<Vec<T>>,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Preloaded with `items` as given, duplicates included
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity + 'static> Repository<T> for InMemoryRepository<T> {
    async fn create(&self, entity: &T) -> DomainResult<T> {
        let mut items = self.items.write().await;
        if items.iter().any(|item| item.id() == entity.id()) {
            return Err(DomainError::Conflict(format!("id {} already exists", entity.id())));
        }
        items.push(entity.clone());
        Ok(entity.clone())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<T>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id() == id).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<T>> {
        Ok(self.items.read().await.clone())
    }

    async fn update(&self, entity: &T) -> DomainResult<T> {
        let mut items = self.items.write().await;
        let slot = items
            .iter_mut()
            .find(|item| item.id() == entity.id())
            .ok_or_else(|| DomainError::NotFound(entity.id().to_string()))?;
        *slot = entity.clone();
        Ok(entity.clone())
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| item.id() != id);
        if items.len() == before {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> DomainResult<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> DomainResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
