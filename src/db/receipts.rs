use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{
    ConfidenceSummary, LineItem, NotificationStatus, ReceiptRecord, ReceiptStatus,
};

/// A receipt as persisted, with the content fingerprint recorded at
/// insert time alongside it.
#[derive(Debug, Clone)]
pub struct StoredReceipt {
    pub record: ReceiptRecord,
    pub fingerprint: String,
}

/// Conditional insert keyed by id. An existing row is left untouched;
/// returns rows written (0 when the id was already present), so the
/// caller can distinguish first write from replay atomically.
pub fn insert_receipt(
    conn: &Connection,
    record: &ReceiptRecord,
    fingerprint: &str,
) -> Result<usize, DatabaseError> {
    let line_items = serde_json::to_string(&record.line_items)?;
    let rows = conn.execute(
        "INSERT INTO receipts (id, container, object_key, event_time, ingested_at,
         vendor_name, transaction_date, transaction_date_raw, currency,
         reported_total, reported_total_raw, computed_total,
         confidence_min, confidence_avg, line_items, low_confidence, total_mismatch,
         fingerprint, status, notification_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20)
         ON CONFLICT(id) DO NOTHING",
        params![
            record.receipt_id.to_string(),
            record.container,
            record.object_key,
            record.event_time,
            record.ingested_at,
            record.vendor_name,
            record.transaction_date,
            record.transaction_date_raw,
            record.currency,
            record.reported_total,
            record.reported_total_raw,
            record.computed_total,
            record.confidence.min,
            record.confidence.avg,
            line_items,
            record.low_confidence as i32,
            record.total_mismatch as i32,
            fingerprint,
            record.status.as_str(),
            record.notification_status.as_str(),
        ],
    )?;
    Ok(rows)
}

struct ReceiptRow {
    id: String,
    container: String,
    object_key: String,
    event_time: DateTime<Utc>,
    ingested_at: DateTime<Utc>,
    vendor_name: Option<String>,
    transaction_date: Option<NaiveDate>,
    transaction_date_raw: Option<String>,
    currency: Option<String>,
    reported_total: Option<f64>,
    reported_total_raw: Option<String>,
    computed_total: Option<f64>,
    confidence_min: f32,
    confidence_avg: f32,
    line_items: String,
    low_confidence: i32,
    total_mismatch: i32,
    fingerprint: String,
    status: String,
    notification_status: String,
}

pub fn get_receipt(conn: &Connection, id: &Uuid) -> Result<Option<StoredReceipt>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, container, object_key, event_time, ingested_at,
         vendor_name, transaction_date, transaction_date_raw, currency,
         reported_total, reported_total_raw, computed_total,
         confidence_min, confidence_avg, line_items, low_confidence, total_mismatch,
         fingerprint, status, notification_status
         FROM receipts WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(ReceiptRow {
            id: row.get(0)?,
            container: row.get(1)?,
            object_key: row.get(2)?,
            event_time: row.get(3)?,
            ingested_at: row.get(4)?,
            vendor_name: row.get(5)?,
            transaction_date: row.get(6)?,
            transaction_date_raw: row.get(7)?,
            currency: row.get(8)?,
            reported_total: row.get(9)?,
            reported_total_raw: row.get(10)?,
            computed_total: row.get(11)?,
            confidence_min: row.get(12)?,
            confidence_avg: row.get(13)?,
            line_items: row.get(14)?,
            low_confidence: row.get(15)?,
            total_mismatch: row.get(16)?,
            fingerprint: row.get(17)?,
            status: row.get(18)?,
            notification_status: row.get(19)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(receipt_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Optimistic status transition guarded by the expected prior status.
/// Returns the number of rows updated (0 when the guard did not match).
pub fn update_status(
    conn: &Connection,
    id: &Uuid,
    expected: ReceiptStatus,
    next: ReceiptStatus,
) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "UPDATE receipts SET status = ?3 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), expected.as_str(), next.as_str()],
    )?;
    Ok(rows)
}

/// Record the notification outcome. A terminal `sent` is never
/// overwritten; returns rows updated (0 when guarded out or missing).
pub fn update_notification_status(
    conn: &Connection,
    id: &Uuid,
    next: NotificationStatus,
) -> Result<usize, DatabaseError> {
    let rows = conn.execute(
        "UPDATE receipts SET notification_status = ?2
         WHERE id = ?1 AND notification_status != ?3",
        params![
            id.to_string(),
            next.as_str(),
            NotificationStatus::Sent.as_str()
        ],
    )?;
    Ok(rows)
}

fn receipt_from_row(row: ReceiptRow) -> Result<StoredReceipt, DatabaseError> {
    let receipt_id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidId(row.id.clone()))?;
    let status = ReceiptStatus::parse(&row.status).ok_or_else(|| DatabaseError::InvalidEnum {
        field: "status".into(),
        value: row.status.clone(),
    })?;
    let notification_status = NotificationStatus::parse(&row.notification_status).ok_or_else(|| {
        DatabaseError::InvalidEnum {
            field: "notification_status".into(),
            value: row.notification_status.clone(),
        }
    })?;
    let line_items: Vec<LineItem> = serde_json::from_str(&row.line_items)?;

    Ok(StoredReceipt {
        record: ReceiptRecord {
            receipt_id,
            container: row.container,
            object_key: row.object_key,
            event_time: row.event_time,
            ingested_at: row.ingested_at,
            vendor_name: row.vendor_name,
            transaction_date: row.transaction_date,
            transaction_date_raw: row.transaction_date_raw,
            currency: row.currency,
            reported_total: row.reported_total,
            reported_total_raw: row.reported_total_raw,
            computed_total: row.computed_total,
            confidence: ConfidenceSummary {
                min: row.confidence_min,
                avg: row.confidence_avg,
            },
            line_items,
            low_confidence: row.low_confidence != 0,
            total_mismatch: row.total_mismatch != 0,
            status,
            notification_status,
        },
        fingerprint: row.fingerprint,
    })
}
