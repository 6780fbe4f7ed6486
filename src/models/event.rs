use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving receipt ids from upload-event identity.
/// Fixed forever: changing it would break idempotent redelivery.
const RECEIPT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8f4a_31d2_6c0b_4e5a_9b71_2d3f_45aa_10c7);

/// Accepted image suffixes for upload events (case-insensitive).
pub const SUPPORTED_SUFFIXES: &[&str] = &["jpg", "jpeg", "png"];

/// An object-storage upload notification. Ephemeral: constructed per
/// invocation, never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub container: String,
    pub object_key: String,
    pub event_time: DateTime<Utc>,
}

impl UploadEvent {
    pub fn new(container: &str, object_key: &str, event_time: DateTime<Utc>) -> Self {
        Self {
            container: container.to_string(),
            object_key: object_key.to_string(),
            event_time,
        }
    }

    /// Deterministic receipt id for this event.
    ///
    /// UUIDv5 over (container, object_key, event_time), so redelivery of
    /// the same upload event always maps to the same identifier.
    pub fn receipt_id(&self) -> Uuid {
        let name = format!(
            "{}/{}@{}",
            self.container,
            self.object_key,
            self.event_time.to_rfc3339()
        );
        Uuid::new_v5(&RECEIPT_ID_NAMESPACE, name.as_bytes())
    }

    /// Whether the object key carries a supported image suffix.
    pub fn has_supported_suffix(&self) -> bool {
        let key = self.object_key.to_ascii_lowercase();
        SUPPORTED_SUFFIXES
            .iter()
            .any(|suffix| key.ends_with(&format!(".{suffix}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(key: &str) -> UploadEvent {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        UploadEvent::new("receipts", key, ts)
    }

    #[test]
    fn receipt_id_deterministic_across_redelivery() {
        let a = event("r1.jpg");
        let b = event("r1.jpg");
        assert_eq!(a.receipt_id(), b.receipt_id());
    }

    #[test]
    fn receipt_id_differs_per_object() {
        assert_ne!(event("r1.jpg").receipt_id(), event("r2.jpg").receipt_id());
    }

    #[test]
    fn receipt_id_differs_per_event_time() {
        let a = event("r1.jpg");
        let mut b = a.clone();
        b.event_time = a.event_time + chrono::Duration::seconds(1);
        assert_ne!(a.receipt_id(), b.receipt_id());
    }

    #[test]
    fn suffix_check_accepts_images() {
        assert!(event("scan.jpg").has_supported_suffix());
        assert!(event("scan.JPEG").has_supported_suffix());
        assert!(event("nested/dir/scan.png").has_supported_suffix());
    }

    #[test]
    fn suffix_check_rejects_other_formats() {
        assert!(!event("invoice.pdf").has_supported_suffix());
        assert!(!event("notes.txt").has_supported_suffix());
        assert!(!event("jpg").has_supported_suffix());
    }
}
