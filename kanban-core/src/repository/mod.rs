//! Repository Layer
//!
//! Data access abstractions and implementations.

mod traits;
mod db;
mod kv;
mod memory;
mod record_repo;


pub use traits::{KeyValueStore, Repository};
pub use db::{init_db, Database};
pub use kv::SqliteKeyValueStore;
pub use memory::{InMemoryRepository, MemoryKeyValueStore};
pub use record_repo::SqliteRepository;
