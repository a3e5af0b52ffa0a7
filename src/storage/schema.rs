//! Database schema definitions
//!
//! The status store and the task queue may share one database file; the
//! registrant table usually lives in a separate file.

use crate::scrape::{FIELDS, IDENTIFIER_FIELD};

/// Status entries, one row per task id
pub const STATUS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS task_status (
    task_id TEXT PRIMARY KEY,
    entry TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_status_expires ON task_status(expires_at);
"#;

/// Queue messages; a row is deleted when its delivery is acknowledged
pub const QUEUE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS task_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    queue TEXT NOT NULL,
    body TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,
    delivery_count INTEGER NOT NULL DEFAULT 0,
    leased_until INTEGER,
    consumer TEXT
);

CREATE INDEX IF NOT EXISTS idx_task_queue_available ON task_queue(queue, leased_until, id);
"#;

/// Field columns of the registrant table
///
/// The masked identifier is not stored; rows are keyed by the digits instead.
pub(crate) fn registrant_columns() -> Vec<&'static str> {
    FIELDS
        .iter()
        .map(|field| field.name)
        .filter(|name| *name != IDENTIFIER_FIELD)
        .collect()
}

/// Builds the registrant table definition, one nullable column per field
pub fn registrants_schema_sql() -> String {
    let columns: String = registrant_columns()
        .into_iter()
        .map(|name| format!("    {} TEXT,\n", name))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS registrants (\n    \
         subject_key TEXT PRIMARY KEY,\n\
         {columns}    \
         created_at TEXT NOT NULL,\n    \
         updated_at TEXT NOT NULL\n);\n"
    )
}

/// Initializes the status table
pub fn initialize_status_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(STATUS_SCHEMA_SQL)
}

/// Initializes the queue table
pub fn initialize_queue_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(QUEUE_SCHEMA_SQL)
}

/// Initializes the registrant table
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_sink_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&registrants_schema_sql())
}
