//! Database Connection and Setup
//!
//! Manages the SQLite file backing local storage and its migrations.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Private in-memory database, handy for tests
    pub fn open_in_memory() -> DomainResult<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

/// Open (creating if needed) the database at `db_path` and migrate it
pub fn init_db(db_path: &Path) -> DomainResult<Database> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DomainError::Internal(format!("Failed to create {}: {}", parent.display(), e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Internal(format!("Failed to open db: {}", e)))?;

    run_migrations(&conn)?;
    tracing::info!(path = %db_path.display(), "database ready");

    Ok(Database::from_connection(conn))
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    // Snapshot storage for persisted stores
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    if !column_exists(conn, "kv_store", "updated_at")? {
        conn.execute("ALTER TABLE kv_store ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0", [])
            .map_err(|e| DomainError::Internal(format!("Failed to add updated_at: {}", e)))?;
    }

    // Entity records for SQLite-backed repositories
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            position INTEGER NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_position ON records(collection, position)",
        [],
    )?;

    Ok(())
}
