//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! Implementations can use SQLite, in-memory, etc.

use async_trait::async_trait;

use crate::domain::{DomainResult, Entity};

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async to support various backends.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity; `Conflict` if the id is taken
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<T>>;

    /// List all entities in insertion order
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Replace an existing entity; `NotFound` if absent
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete entity by ID; `NotFound` if absent
    async fn delete(&self, id: &str) -> DomainResult<()>;
}

/// Device-local key-value storage holding serialized store snapshots
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> DomainResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> DomainResult<()>;

    async fn remove(&self, key: &str) -> DomainResult<()>;
}
