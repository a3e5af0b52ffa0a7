//! SQLite-backed durable task queue
//!
//! Messages live in a table until acknowledged. Claiming a message leases it
//! to one consumer for `lease` time; if the consumer dies without acknowledging,
//! the lease runs out and the next claim by any consumer picks it up again with
//! an incremented delivery count.
//!
//! Claims run inside `BEGIN IMMEDIATE` so competing worker processes sharing
//! the same file never lease the same message twice.

use crate::storage::schema::initialize_queue_schema;
use crate::storage::sqlite::{duration_millis, now_millis, open_connection, open_in_memory_connection};
use crate::storage::traits::{Delivery, StorageError, StorageResult, TaskQueue};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

struct QueueState {
    conn: Connection,
    /// Delivery tag of the unacknowledged message, if any
    in_flight: Option<i64>,
}

/// Durable queue with single-message prefetch per consumer
pub struct SqliteTaskQueue {
    state: Mutex<QueueState>,
    queue: String,
    consumer_tag: String,
    lease: Duration,
}

impl SqliteTaskQueue {
    /// Opens (or creates) the named queue in the given database file
    pub fn open(path: &Path, queue: &str, lease: Duration) -> StorageResult<Self> {
        let conn = open_connection(path)?;
        Self::with_connection(conn, queue, lease)
    }

    /// Creates a queue in a private in-memory database
    pub fn open_in_memory(queue: &str, lease: Duration) -> StorageResult<Self> {
        let conn = open_in_memory_connection()?;
        Self::with_connection(conn, queue, lease)
    }

    fn with_connection(conn: Connection, queue: &str, lease: Duration) -> StorageResult<Self> {
        initialize_queue_schema(&conn)?;
        Ok(Self {
            state: Mutex::new(QueueState {
                conn,
                in_flight: None,
            }),
            queue: queue.to_string(),
            consumer_tag: uuid::Uuid::new_v4().to_string(),
            lease,
        })
    }

    /// Identifies this consumer in lease records
    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    fn state(&self) -> StorageResult<MutexGuard<'_, QueueState>> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Clears the in-flight slot if it holds `delivery_tag`
    fn take_in_flight(state: &mut QueueState, delivery_tag: i64) -> StorageResult<()> {
        if state.in_flight != Some(delivery_tag) {
            return Err(StorageError::UnknownDelivery(delivery_tag));
        }
        state.in_flight = None;
        Ok(())
    }
}

impl TaskQueue for SqliteTaskQueue {
    fn publish(&self, body: &str) -> StorageResult<()> {
        self.state()?.conn.execute(
            "INSERT INTO task_queue (queue, body, enqueued_at) VALUES (?1, ?2, ?3)",
            params![self.queue, body, now_millis()],
        )?;
        Ok(())
    }

    fn claim(&self) -> StorageResult<Option<Delivery>> {
        let mut state = self.state()?;
        if state.in_flight.is_some() {
            return Err(StorageError::PrefetchExceeded);
        }

        let now = now_millis();
        let leased_until = now.saturating_add(duration_millis(self.lease));

        let tx = state
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: Option<(i64, String, u32)> = tx
            .query_row(
                "SELECT id, body, delivery_count FROM task_queue
                 WHERE queue = ?1 AND (leased_until IS NULL OR leased_until <= ?2)
                 ORDER BY id LIMIT 1",
                params![self.queue, now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((id, body, previous_deliveries)) = next else {
            tx.commit()?;
            return Ok(None);
        };

        tx.execute(
            "UPDATE task_queue
             SET delivery_count = delivery_count + 1, leased_until = ?1, consumer = ?2
             WHERE id = ?3",
            params![leased_until, self.consumer_tag, id],
        )?;
        tx.commit()?;

        state.in_flight = Some(id);

        let delivery = Delivery {
            delivery_tag: id,
            body,
            delivery_count: previous_deliveries + 1,
        };
        if delivery.redelivered() {
            tracing::warn!(
                delivery_tag = id,
                delivery_count = delivery.delivery_count,
                "Redelivering message whose lease expired"
            );
        }
        Ok(Some(delivery))
    }

    fn ack(&self, delivery_tag: i64) -> StorageResult<()> {
        let mut state = self.state()?;
        Self::take_in_flight(&mut state, delivery_tag)?;

        let removed = state.conn.execute(
            "DELETE FROM task_queue WHERE id = ?1 AND consumer = ?2",
            params![delivery_tag, self.consumer_tag],
        )?;

        if removed == 0 {
            // Lease expired and another consumer claimed it; that consumer owns it now
            tracing::warn!(delivery_tag, "Acknowledged message was already re-leased elsewhere");
        }
        Ok(())
    }

    fn abandon(&self, delivery_tag: i64) -> StorageResult<()> {
        let mut state = self.state()?;
        Self::take_in_flight(&mut state, delivery_tag)?;
        tracing::warn!(delivery_tag, "Delivery abandoned, waiting for lease expiry");
        Ok(())
    }

    fn pending_count(&self) -> StorageResult<u64> {
        let count: i64 = self.state()?.conn.query_row(
            "SELECT COUNT(*) FROM task_queue WHERE queue = ?1",
            params![self.queue],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
