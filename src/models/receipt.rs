use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::enums::{NotificationStatus, ReceiptStatus};

/// One ordered element of a line-item group.
///
/// Numeric fields parse defensively: raw OCR text is always retained,
/// the typed value is present only when parsing succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity_raw: String,
    pub quantity: Option<f64>,
    pub unit_price_raw: String,
    pub unit_price: Option<f64>,
    pub line_total_raw: String,
    pub line_total: Option<f64>,
    pub confidence: f32,
}

/// Min/avg confidence across the canonical summary fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub min: f32,
    pub avg: f32,
}

impl ConfidenceSummary {
    /// Summarize a set of canonical-field confidences. Empty input means
    /// nothing usable was detected and reads as zero confidence.
    pub fn from_scores(scores: &[f32]) -> Self {
        if scores.is_empty() {
            return Self { min: 0.0, avg: 0.0 };
        }
        let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
        let avg = scores.iter().sum::<f32>() / scores.len() as f32;
        Self { min, avg }
    }
}

/// The persisted receipt entity. Owned by the persistence gateway once
/// written; the controller holds only a transient reference per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub receipt_id: Uuid,
    pub container: String,
    pub object_key: String,
    pub event_time: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub vendor_name: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_date_raw: Option<String>,
    pub currency: Option<String>,
    pub reported_total: Option<f64>,
    pub reported_total_raw: Option<String>,
    /// Sum of parsed line totals; None when no line total parsed.
    pub computed_total: Option<f64>,
    pub confidence: ConfidenceSummary,
    pub line_items: Vec<LineItem>,
    pub low_confidence: bool,
    pub total_mismatch: bool,
    pub status: ReceiptStatus,
    pub notification_status: NotificationStatus,
}

/// Content view used for replay comparison: everything that derives from
/// the OCR analysis, excluding lifecycle fields and ingestion wall time
/// (both legitimately differ between deliveries of the same event).
#[derive(Serialize)]
struct ContentView<'a> {
    receipt_id: &'a Uuid,
    container: &'a str,
    object_key: &'a str,
    event_time: &'a DateTime<Utc>,
    vendor_name: &'a Option<String>,
    transaction_date: &'a Option<NaiveDate>,
    transaction_date_raw: &'a Option<String>,
    currency: &'a Option<String>,
    reported_total: &'a Option<f64>,
    reported_total_raw: &'a Option<String>,
    computed_total: &'a Option<f64>,
    line_items: &'a [LineItem],
    low_confidence: bool,
    total_mismatch: bool,
}

impl ReceiptRecord {
    /// SHA-256 fingerprint of the record's content, base64-encoded.
    ///
    /// Two records for the same event derived from the same OCR analysis
    /// fingerprint identically regardless of when they were processed.
    pub fn fingerprint(&self) -> String {
        let view = ContentView {
            receipt_id: &self.receipt_id,
            container: &self.container,
            object_key: &self.object_key,
            event_time: &self.event_time,
            vendor_name: &self.vendor_name,
            transaction_date: &self.transaction_date,
            transaction_date_raw: &self.transaction_date_raw,
            currency: &self.currency,
            reported_total: &self.reported_total,
            reported_total_raw: &self.reported_total_raw,
            computed_total: &self.computed_total,
            line_items: &self.line_items,
            low_confidence: self.low_confidence,
            total_mismatch: self.total_mismatch,
        };
        let json = serde_json::to_vec(&view).expect("content view serializes");
        let hash = Sha256::digest(&json);
        base64::engine::general_purpose::STANDARD.encode(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> ReceiptRecord {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        ReceiptRecord {
            receipt_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, b"sample"),
            container: "receipts".into(),
            object_key: "r1.jpg".into(),
            event_time: ts,
            ingested_at: ts,
            vendor_name: Some("Acme Diner".into()),
            transaction_date: NaiveDate::from_ymd_opt(2026, 3, 14),
            transaction_date_raw: Some("2026-03-14".into()),
            currency: Some("USD".into()),
            reported_total: Some(12.50),
            reported_total_raw: Some("$12.50".into()),
            computed_total: Some(12.50),
            confidence: ConfidenceSummary { min: 0.88, avg: 0.93 },
            line_items: vec![LineItem {
                description: "Coffee".into(),
                quantity_raw: "1".into(),
                quantity: Some(1.0),
                unit_price_raw: "12.50".into(),
                unit_price: Some(12.50),
                line_total_raw: "12.50".into(),
                line_total: Some(12.50),
                confidence: 0.91,
            }],
            low_confidence: false,
            total_mismatch: false,
            status: ReceiptStatus::Received,
            notification_status: NotificationStatus::Pending,
        }
    }

    #[test]
    fn fingerprint_stable_across_lifecycle_changes() {
        let mut record = sample_record();
        let before = record.fingerprint();

        record.status = ReceiptStatus::Notified;
        record.notification_status = NotificationStatus::Sent;
        record.ingested_at = record.ingested_at + chrono::Duration::hours(3);

        assert_eq!(before, record.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let record = sample_record();
        let mut other = record.clone();
        other.reported_total = Some(13.00);
        assert_ne!(record.fingerprint(), other.fingerprint());
    }

    #[test]
    fn confidence_summary_min_and_avg() {
        let summary = ConfidenceSummary::from_scores(&[0.9, 0.6, 0.75]);
        assert!((summary.min - 0.6).abs() < f32::EPSILON);
        assert!((summary.avg - 0.75).abs() < 1e-6);
    }

    #[test]
    fn confidence_summary_empty_is_zero() {
        let summary = ConfidenceSummary::from_scores(&[]);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.avg, 0.0);
    }
}
