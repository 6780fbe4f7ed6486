use super::compose::compose;
use super::mailer::Mailer;
use super::NotifyError;
use crate::models::{NotificationStatus, ReceiptRecord};
use crate::pipeline::retry::RetryPolicy;

/// Best-effort notification stage.
///
/// Dispatch never fails the pipeline: a persisted record is the success
/// criterion, the email outcome is merely recorded. Transient relay
/// failures are retried within the budget; permanent ones are not.
pub struct NotificationDispatcher {
    mailer: Box<dyn Mailer + Send + Sync>,
    sender: String,
    recipient: String,
    /// Whether review-flagged records (low confidence, total mismatch)
    /// still trigger an email.
    notify_on_review: bool,
    retry: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Box<dyn Mailer + Send + Sync>,
        sender: &str,
        recipient: &str,
        notify_on_review: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            mailer,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            notify_on_review,
            retry,
        }
    }

    /// Attempt the notification and report the outcome to record.
    pub fn dispatch(&self, record: &ReceiptRecord) -> NotificationStatus {
        let needs_review = record.low_confidence || record.total_mismatch;
        if needs_review && !self.notify_on_review {
            tracing::info!(
                receipt_id = %record.receipt_id,
                low_confidence = record.low_confidence,
                total_mismatch = record.total_mismatch,
                "notification suppressed for review-flagged record"
            );
            return NotificationStatus::Skipped;
        }

        let email = compose(record, &self.sender, &self.recipient);
        let result = self
            .retry
            .run("send_email", NotifyError::is_transient, || {
                self.mailer.send(&email)
            });

        match result {
            Ok(()) => {
                tracing::info!(
                    receipt_id = %record.receipt_id,
                    recipient = %self.recipient,
                    "summary email sent"
                );
                NotificationStatus::Sent
            }
            Err(e) => {
                tracing::warn!(
                    receipt_id = %record.receipt_id,
                    error = %e,
                    permanent = !e.is_transient(),
                    "notification failed"
                );
                NotificationStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::notify::mailer::MockMailer;
    use crate::models::{ConfidenceSummary, ReceiptStatus};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(low_confidence: bool) -> ReceiptRecord {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        ReceiptRecord {
            receipt_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, b"dispatch-test"),
            container: "receipts".into(),
            object_key: "r1.jpg".into(),
            event_time: ts,
            ingested_at: ts,
            vendor_name: Some("Acme Diner".into()),
            transaction_date: None,
            transaction_date_raw: None,
            currency: None,
            reported_total: Some(12.50),
            reported_total_raw: Some("$12.50".into()),
            computed_total: None,
            confidence: ConfidenceSummary { min: 0.9, avg: 0.9 },
            line_items: vec![],
            low_confidence,
            total_mismatch: false,
            status: ReceiptStatus::Stored,
            notification_status: crate::models::NotificationStatus::Pending,
        }
    }

    fn dispatcher(mailer: MockMailer, notify_on_review: bool) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Box::new(mailer),
            "noreply@example.com",
            "inbox@example.com",
            notify_on_review,
            RetryPolicy::immediate(3),
        )
    }

    #[test]
    fn successful_send_reports_sent() {
        let d = dispatcher(MockMailer::delivering(), true);
        assert_eq!(d.dispatch(&record(false)), NotificationStatus::Sent);
    }

    #[test]
    fn permanent_failure_reports_failed_without_retry() {
        let d = dispatcher(MockMailer::rejecting(), true);
        assert_eq!(d.dispatch(&record(false)), NotificationStatus::Failed);
    }

    #[test]
    fn transient_failure_retried_to_success() {
        let d = dispatcher(MockMailer::throttled_then(2), true);
        assert_eq!(d.dispatch(&record(false)), NotificationStatus::Sent);
    }

    #[test]
    fn transient_budget_exhaustion_reports_failed() {
        let d = dispatcher(MockMailer::throttled_then(10), true);
        assert_eq!(d.dispatch(&record(false)), NotificationStatus::Failed);
    }

    #[test]
    fn review_flagged_record_skipped_under_policy() {
        let d = dispatcher(MockMailer::delivering(), false);
        assert_eq!(d.dispatch(&record(true)), NotificationStatus::Skipped);
    }

    #[test]
    fn review_flagged_record_sent_when_policy_allows() {
        let d = dispatcher(MockMailer::delivering(), true);
        assert_eq!(d.dispatch(&record(true)), NotificationStatus::Sent);
    }
}
