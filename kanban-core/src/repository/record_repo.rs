//! SQLite Record Repository
//!
//! Stores any serializable entity as a JSON body in the shared `records`
//! table, one collection per entity kind. Rows keep insertion order.

use std::marker::PhantomData;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::db::Database;
use super::traits::Repository;
use crate::domain::{DomainError, DomainResult, Entity};

pub struct SqliteRepository<T> {
    db: Database,
    collection: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SqliteRepository<T> {
    pub fn new(db: Database, collection: &'static str) -> Self {
        Self {
            db,
            collection,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> Repository<T> for SqliteRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + 'static,
{
    async fn create(&self, entity: &T) -> DomainResult<T> {
        let body = serde_json::to_string(entity)?;
        let conn = self.db.conn.lock().await;

        let exists = conn
            .query_row(
                "SELECT 1 FROM records WHERE collection = ? AND id = ?",
                params![self.collection, entity.id()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(DomainError::Conflict(format!("id {} already exists", entity.id())));
        }

        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM records WHERE collection = ?",
            params![self.collection],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO records (collection, id, position, body) VALUES (?, ?, ?, ?)",
            params![self.collection, entity.id(), position, body],
        )?;
        Ok(entity.clone())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<T>> {
        let conn = self.db.conn.lock().await;
        let body = conn
            .query_row(
                "SELECT body FROM records WHERE collection = ? AND id = ?",
                params![self.collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> DomainResult<Vec<T>> {
        let conn = self.db.conn.lock().await;
        let mut stmt = conn.prepare("SELECT body FROM records WHERE collection = ? ORDER BY position ASC")?;
        let rows = stmt.query_map(params![self.collection], |row| row.get::<_, String>(0))?;

        let mut items = Vec::new();
        for body in rows {
            items.push(serde_json::from_str(&body?)?);
        }
        Ok(items)
    }

    async fn update(&self, entity: &T) -> DomainResult<T> {
        let body = serde_json::to_string(entity)?;
        let conn = self.db.conn.lock().await;
        let changed = conn.execute(
            "UPDATE records SET body = ? WHERE collection = ? AND id = ?",
            params![body, self.collection, entity.id()],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(entity.id().to_string()));
        }
        Ok(entity.clone())
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let conn = self.db.conn.lock().await;
        let changed = conn.execute(
            "DELETE FROM records WHERE collection = ? AND id = ?",
            params![self.collection, id],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
