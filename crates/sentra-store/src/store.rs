//! Store handle and initialization.

use crate::schema::SCHEMA;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Shared connection handle passed to every service.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Store initialization error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// SQLite-backed store.
pub struct Store {
    conn: SharedConnection,
}

impl Store {
    /// Open (creating if necessary) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        for statement in SCHEMA {
            conn.execute(statement, [])?;
        }
        debug!("store schema initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The shared connection handle.
    pub fn connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_initializes_schema() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let conn = conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 6);
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentra.db");
        drop(Store::open(&path).unwrap());
        // Re-opening runs the schema again without error.
        drop(Store::open(&path).unwrap());
    }

    #[test]
    fn test_single_flight_index_enforced() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let conn = conn.lock();
        conn.execute(
            "INSERT INTO export_jobs (id, user_id, token, format, categories, status, created_at)
             VALUES ('a', 'u1', 't1', 'json', '[]', 'pending', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        // Second in-flight job for the same user must violate the index.
        let err = conn.execute(
            "INSERT INTO export_jobs (id, user_id, token, format, categories, status, created_at)
             VALUES ('b', 'u1', 't2', 'json', '[]', 'processing', '2026-01-01T00:00:01Z')",
            [],
        );
        assert!(err.is_err());
        // A completed job does not occupy the slot.
        conn.execute(
            "UPDATE export_jobs SET status = 'completed' WHERE id = 'a'",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO export_jobs (id, user_id, token, format, categories, status, created_at)
             VALUES ('c', 'u1', 't3', 'json', '[]', 'pending', '2026-01-01T00:00:02Z')",
            [],
        )
        .unwrap();
    }
}
