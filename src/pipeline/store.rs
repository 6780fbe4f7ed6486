use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{NotificationStatus, ReceiptRecord, ReceiptStatus};
use crate::pipeline::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("receipt {receipt_id} already stored with different content")]
    ContentConflict { receipt_id: Uuid },

    #[error("receipt {receipt_id}: expected status {expected:?}, found {actual:?}")]
    StatusConflict {
        receipt_id: Uuid,
        expected: ReceiptStatus,
        actual: ReceiptStatus,
    },

    #[error("receipt {0} not found")]
    NotFound(Uuid),
}

/// Outcome of an idempotent store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First write for this receipt id.
    Inserted,
    /// A record with identical content already existed (event redelivery).
    Replayed,
}

/// Durable, idempotent storage for receipt records.
///
/// All writes are conditional: the same upload event may be stored any
/// number of times without creating duplicates or losing updates.
pub trait ReceiptStore {
    /// Conditional insert keyed by `receipt_id`. Identical existing
    /// content is a success (`Replayed`); differing content is a
    /// consistency fault.
    fn store(&self, record: &ReceiptRecord) -> Result<StoreOutcome, StoreError>;

    fn get(&self, id: &Uuid) -> Result<Option<ReceiptRecord>, StoreError>;

    /// Optimistic lifecycle transition guarded by the expected prior
    /// status. Losing a race to an identical transition is a success.
    fn transition(
        &self,
        id: &Uuid,
        expected: ReceiptStatus,
        next: ReceiptStatus,
    ) -> Result<(), StoreError>;

    /// Record the notification outcome; never regresses a terminal
    /// `sent`.
    fn record_notification(&self, id: &Uuid, status: NotificationStatus)
        -> Result<(), StoreError>;
}

/// SQLite-backed gateway. Transient lock contention is retried with
/// backoff before surfacing as fatal for the run.
pub struct SqliteStore {
    conn: Connection,
    retry: RetryPolicy,
}

impl SqliteStore {
    pub fn new(conn: Connection, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    fn with_retry<T>(
        &self,
        what: &str,
        op: impl FnMut() -> Result<T, DatabaseError>,
    ) -> Result<T, StoreError> {
        self.retry
            .run(what, DatabaseError::is_transient, op)
            .map_err(StoreError::Database)
    }
}

impl ReceiptStore for SqliteStore {
    fn store(&self, record: &ReceiptRecord) -> Result<StoreOutcome, StoreError> {
        let fingerprint = record.fingerprint();

        // Atomic conditional write: a concurrent delivery racing this one
        // cannot interleave between a read and the insert.
        let rows = self.with_retry("store_insert", || {
            db::insert_receipt(&self.conn, record, &fingerprint)
        })?;
        if rows > 0 {
            return Ok(StoreOutcome::Inserted);
        }

        let existing = self
            .with_retry("store_check", || db::get_receipt(&self.conn, &record.receipt_id))?
            .ok_or(StoreError::NotFound(record.receipt_id))?;
        if existing.fingerprint == fingerprint {
            tracing::info!(receipt_id = %record.receipt_id, "replayed identical record");
            Ok(StoreOutcome::Replayed)
        } else {
            Err(StoreError::ContentConflict {
                receipt_id: record.receipt_id,
            })
        }
    }

    fn get(&self, id: &Uuid) -> Result<Option<ReceiptRecord>, StoreError> {
        let stored = self.with_retry("get", || db::get_receipt(&self.conn, id))?;
        Ok(stored.map(|s| s.record))
    }

    fn transition(
        &self,
        id: &Uuid,
        expected: ReceiptStatus,
        next: ReceiptStatus,
    ) -> Result<(), StoreError> {
        let rows =
            self.with_retry("transition", || db::update_status(&self.conn, id, expected, next))?;
        if rows > 0 {
            return Ok(());
        }

        // Guard did not match: a concurrent delivery may have won the
        // same transition, which is fine; anything else is a conflict.
        let stored = self
            .with_retry("transition_check", || db::get_receipt(&self.conn, id))?
            .ok_or(StoreError::NotFound(*id))?;
        if stored.record.status == next {
            Ok(())
        } else {
            Err(StoreError::StatusConflict {
                receipt_id: *id,
                expected,
                actual: stored.record.status,
            })
        }
    }

    fn record_notification(
        &self,
        id: &Uuid,
        status: NotificationStatus,
    ) -> Result<(), StoreError> {
        let rows = self.with_retry("record_notification", || {
            db::update_notification_status(&self.conn, id, status)
        })?;
        if rows > 0 {
            return Ok(());
        }

        let stored = self
            .with_retry("notification_check", || db::get_receipt(&self.conn, id))?
            .ok_or(StoreError::NotFound(*id))?;
        // Guarded out only when already terminally sent.
        debug_assert_eq!(stored.record.notification_status, NotificationStatus::Sent);
        Ok(())
    }
}
