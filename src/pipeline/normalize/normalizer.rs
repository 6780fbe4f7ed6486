use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::parse::{infer_currency, parse_amount, parse_date};
use super::select::select_canonical;
use super::NormalizationError;
use crate::models::{
    ConfidenceSummary, FieldKind, LineItem, NotificationStatus, ReceiptRecord, ReceiptStatus,
    UploadEvent,
};
use crate::pipeline::extraction::ExpenseAnalysis;

/// Relative tolerance between the reported total and the sum of line
/// totals before the record is flagged for review.
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// Canonical-field confidence below which the whole record is flagged.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.50;

/// Deterministically map an expense analysis onto a `ReceiptRecord`
/// skeleton. Partial data is kept, never dropped: missing vendor/total
/// or unparseable values flag the record `low_confidence` for manual
/// review instead of aborting.
pub fn normalize(
    event: &UploadEvent,
    receipt_id: Uuid,
    analysis: &ExpenseAnalysis,
    ingested_at: DateTime<Utc>,
) -> Result<ReceiptRecord, NormalizationError> {
    let canonical = select_canonical(&analysis.detections);

    let vendor_name = canonical
        .get(&FieldKind::Vendor)
        .map(|d| d.text.trim().to_string())
        .filter(|v| !v.is_empty());

    let total_detection = canonical.get(&FieldKind::Total);
    let reported_total_raw = total_detection.map(|d| d.text.clone());
    let reported_total = reported_total_raw.as_deref().and_then(parse_amount);

    let date_detection = canonical.get(&FieldKind::Date);
    let transaction_date_raw = date_detection.map(|d| d.text.clone());
    let transaction_date = transaction_date_raw.as_deref().and_then(parse_date);

    // Explicit currency detection wins; otherwise infer from the total's
    // raw text (the symbol usually rides along with the amount).
    let currency = canonical
        .get(&FieldKind::Currency)
        .and_then(|d| infer_currency(&d.text))
        .or_else(|| reported_total_raw.as_deref().and_then(infer_currency));

    let line_items = normalize_line_items(&analysis.line_item_groups)?;

    let parsed_totals: Vec<f64> = line_items.iter().filter_map(|i| i.line_total).collect();
    let computed_total: Option<f64> = if parsed_totals.is_empty() {
        None
    } else {
        Some(parsed_totals.iter().sum())
    };

    let total_mismatch = match (reported_total, computed_total) {
        (Some(reported), Some(computed)) if reported > 0.0 => {
            (computed - reported).abs() / reported > TOTAL_TOLERANCE
        }
        _ => false,
    };

    let scores: Vec<f32> = canonical.values().map(|d| d.confidence).collect();
    let confidence = ConfidenceSummary::from_scores(&scores);

    let low_confidence = vendor_name.is_none()
        || total_detection.is_none()
        || reported_total.is_none()
        || (date_detection.is_some() && transaction_date.is_none())
        || confidence.min < LOW_CONFIDENCE_THRESHOLD;

    Ok(ReceiptRecord {
        receipt_id,
        container: event.container.clone(),
        object_key: event.object_key.clone(),
        event_time: event.event_time,
        ingested_at,
        vendor_name,
        transaction_date,
        transaction_date_raw,
        currency,
        reported_total,
        reported_total_raw,
        computed_total,
        confidence,
        line_items,
        low_confidence,
        total_mismatch,
        status: ReceiptStatus::Received,
        notification_status: NotificationStatus::Pending,
    })
}

/// Flatten line-item groups preserving reading order. An item with no
/// fields at all is structurally invalid input.
fn normalize_line_items(
    groups: &[Vec<crate::pipeline::extraction::RawLineItem>],
) -> Result<Vec<LineItem>, NormalizationError> {
    let mut items = Vec::new();

    for (group_idx, group) in groups.iter().enumerate() {
        for (item_idx, raw) in group.iter().enumerate() {
            let has_any = raw.description.is_some()
                || raw.quantity.is_some()
                || raw.unit_price.is_some()
                || raw.line_total.is_some();
            if !has_any {
                return Err(NormalizationError::MalformedLineItem {
                    group: group_idx,
                    index: item_idx,
                });
            }

            let quantity_raw = raw.quantity.clone().unwrap_or_default();
            let unit_price_raw = raw.unit_price.clone().unwrap_or_default();
            let line_total_raw = raw.line_total.clone().unwrap_or_default();

            items.push(LineItem {
                description: raw.description.clone().unwrap_or_default(),
                quantity: parse_amount(&quantity_raw),
                quantity_raw,
                unit_price: parse_amount(&unit_price_raw),
                unit_price_raw,
                line_total: parse_amount(&line_total_raw),
                line_total_raw,
                confidence: raw.confidence,
            });
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{RawDetection, RawLineItem};
    use chrono::TimeZone;

    fn event() -> UploadEvent {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        UploadEvent::new("receipts", "r1.jpg", ts)
    }

    fn detection(label: &str, text: &str, confidence: f32) -> RawDetection {
        RawDetection {
            label: label.into(),
            text: text.into(),
            confidence,
        }
    }

    fn item(desc: &str, qty: &str, price: &str, total: &str, confidence: f32) -> RawLineItem {
        RawLineItem {
            description: Some(desc.into()),
            quantity: Some(qty.into()),
            unit_price: Some(price.into()),
            line_total: Some(total.into()),
            confidence,
        }
    }

    fn run(analysis: &ExpenseAnalysis) -> ReceiptRecord {
        let e = event();
        normalize(&e, e.receipt_id(), analysis, Utc::now()).unwrap()
    }

    #[test]
    fn full_receipt_normalizes_cleanly() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "$12.50", 0.88),
                detection("INVOICE_RECEIPT_DATE", "2026-03-14", 0.90),
            ],
            line_item_groups: vec![vec![item("Coffee", "1", "12.50", "12.50", 0.91)]],
        };

        let record = run(&analysis);
        assert_eq!(record.vendor_name.as_deref(), Some("Acme Diner"));
        assert_eq!(record.reported_total, Some(12.50));
        assert_eq!(record.computed_total, Some(12.50));
        assert_eq!(record.currency.as_deref(), Some("USD"));
        assert_eq!(
            record.transaction_date,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 14)
        );
        assert_eq!(record.line_items.len(), 1);
        assert!(!record.low_confidence);
        assert!(!record.total_mismatch);
    }

    #[test]
    fn missing_total_flags_low_confidence() {
        let analysis = ExpenseAnalysis {
            detections: vec![detection("VENDOR_NAME", "Acme Diner", 0.91)],
            line_item_groups: vec![vec![item("Coffee", "1", "12.50", "12.50", 0.91)]],
        };

        let record = run(&analysis);
        assert!(record.low_confidence);
        assert!(record.reported_total.is_none());
        // Partial data is still fully populated.
        assert_eq!(record.line_items.len(), 1);
    }

    #[test]
    fn unparseable_total_keeps_raw_text() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "smudged", 0.55),
            ],
            line_item_groups: vec![],
        };

        let record = run(&analysis);
        assert_eq!(record.reported_total_raw.as_deref(), Some("smudged"));
        assert!(record.reported_total.is_none());
        assert!(record.low_confidence);
    }

    #[test]
    fn unparseable_date_keeps_raw_text() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "$10.00", 0.90),
                detection("RECEIPT_DATE", "Tuesdayish", 0.61),
            ],
            line_item_groups: vec![],
        };

        let record = run(&analysis);
        assert_eq!(record.transaction_date_raw.as_deref(), Some("Tuesdayish"));
        assert!(record.transaction_date.is_none());
        assert!(record.low_confidence);
    }

    #[test]
    fn reconciliation_within_tolerance() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "20.00", 0.90),
            ],
            line_item_groups: vec![vec![
                item("Coffee", "1", "9.99", "9.99", 0.9),
                item("Bagel", "1", "9.99", "9.99", 0.9),
            ]],
        };

        let record = run(&analysis);
        assert_eq!(record.computed_total, Some(19.98));
        assert!(!record.total_mismatch);
    }

    #[test]
    fn reconciliation_mismatch_flagged() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "50.00", 0.90),
            ],
            line_item_groups: vec![vec![
                item("Coffee", "1", "9.99", "9.99", 0.9),
                item("Bagel", "1", "9.99", "9.99", 0.9),
            ]],
        };

        let record = run(&analysis);
        assert!(record.total_mismatch);
        // Mismatch never aborts the pipeline.
        assert_eq!(record.line_items.len(), 2);
    }

    #[test]
    fn line_item_order_preserved_across_groups() {
        let analysis = ExpenseAnalysis {
            detections: vec![detection("TOTAL", "30.00", 0.9)],
            line_item_groups: vec![
                vec![item("First", "1", "10", "10", 0.9), item("Second", "1", "10", "10", 0.9)],
                vec![item("Third", "1", "10", "10", 0.9)],
            ],
        };

        let record = run(&analysis);
        let descriptions: Vec<_> =
            record.line_items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn low_canonical_confidence_flags_record() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.30),
                detection("TOTAL", "12.50", 0.90),
            ],
            line_item_groups: vec![],
        };

        let record = run(&analysis);
        assert!(record.low_confidence);
        assert!((record.confidence.min - 0.30).abs() < f32::EPSILON);
    }

    #[test]
    fn item_with_no_fields_is_malformed() {
        let analysis = ExpenseAnalysis {
            detections: vec![detection("TOTAL", "12.50", 0.9)],
            line_item_groups: vec![vec![RawLineItem::default()]],
        };

        let e = event();
        let err = normalize(&e, e.receipt_id(), &analysis, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::MalformedLineItem { group: 0, index: 0 }
        ));
    }

    #[test]
    fn no_line_totals_means_no_computed_total() {
        let analysis = ExpenseAnalysis {
            detections: vec![
                detection("VENDOR_NAME", "Acme Diner", 0.91),
                detection("TOTAL", "12.50", 0.90),
            ],
            line_item_groups: vec![vec![RawLineItem {
                description: Some("Coffee".into()),
                quantity: None,
                unit_price: None,
                line_total: Some("illegible".into()),
                confidence: 0.4,
            }]],
        };

        let record = run(&analysis);
        assert!(record.computed_total.is_none());
        assert!(!record.total_mismatch);
    }
}
