//! SQLite-backed status store

use crate::state::StatusEntry;
use crate::storage::schema::initialize_status_schema;
use crate::storage::sqlite::{duration_millis, now_millis, open_connection, open_in_memory_connection};
use crate::storage::traits::{StatusStore, StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Status store keeping one row per task id with an absolute expiry time
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl SqliteStatusStore {
    /// Opens (or creates) the status table in the given database file
    pub fn open(path: &Path, ttl: Duration) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        Self::with_connection(conn, ttl)
    }

    /// Creates a store in a private in-memory database
    pub fn open_in_memory(ttl: Duration) -> StorageResult<Self> {
        let conn = open_in_memory_connection()?;
        Self::with_connection(conn, ttl)
    }

    fn with_connection(conn: Connection, ttl: Duration) -> StorageResult<Self> {
        initialize_status_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl StatusStore for SqliteStatusStore {
    fn set(&self, task_id: &str, entry: &StatusEntry) -> StorageResult<()> {
        let body = entry.to_json()?;
        let expires_at = now_millis().saturating_add(duration_millis(self.ttl));

        self.conn()?.execute(
            "INSERT INTO task_status (task_id, entry, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(task_id) DO UPDATE SET entry = excluded.entry, expires_at = excluded.expires_at",
            params![task_id, body, expires_at],
        )?;
        Ok(())
    }

    fn get(&self, task_id: &str) -> StorageResult<Option<StatusEntry>> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT entry FROM task_status WHERE task_id = ?1 AND expires_at > ?2",
                params![task_id, now_millis()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(raw) => Ok(Some(StatusEntry::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    fn purge_expired(&self) -> StorageResult<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM task_status WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        Ok(removed)
    }

    fn ping(&self) -> StorageResult<()> {
        self.conn()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
