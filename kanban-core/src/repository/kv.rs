//! SQLite key-value storage
//!
//! One row per persisted store, keyed by the store's storage name.

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use super::db::Database;
use super::traits::KeyValueStore;
use crate::domain::DomainResult;

pub struct SqliteKeyValueStore {
    db: Database,
}

impl SqliteKeyValueStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> DomainResult<Option<String>> {
        let conn = self.db.conn.lock().await;
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> DomainResult<()> {
        let conn = self.db.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> DomainResult<()> {
        let conn = self.db.conn.lock().await;
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}
