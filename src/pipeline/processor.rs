//! Receipt processing controller.
//!
//! Single entry point that drives the full pipeline per upload event:
//! validate → extract → normalize → store → notify. Uses trait-based DI
//! for the external collaborators (ExpenseAnalyzer, ReceiptStore,
//! Mailer) so every stage is testable with mock implementations.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NotificationStatus, ReceiptRecord, ReceiptStatus, UploadEvent};
use crate::pipeline::extraction::{ExpenseAnalyzer, ExtractionError};
use crate::pipeline::normalize::{normalize, NormalizationError};
use crate::pipeline::notify::NotificationDispatcher;
use crate::pipeline::store::{ReceiptStore, StoreError};

/// Errors that abort a pipeline run. Everything here happens before the
/// record is durable, so redelivery of the event retries cleanly.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("invalid upload event: {0}")]
    Validation(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub receipt_id: Uuid,
    pub status: ReceiptStatus,
    pub notification_status: NotificationStatus,
    pub low_confidence: bool,
    pub total_mismatch: bool,
    pub line_item_count: usize,
    /// True when this event had already been processed (redelivery).
    pub replayed: bool,
}

impl ProcessingOutcome {
    fn from_record(record: &ReceiptRecord, replayed: bool) -> Self {
        Self {
            receipt_id: record.receipt_id,
            status: record.status,
            notification_status: record.notification_status,
            low_confidence: record.low_confidence,
            total_mismatch: record.total_mismatch,
            line_item_count: record.line_items.len(),
            replayed,
        }
    }
}

/// Orchestrates one stateless pipeline run per upload event.
///
/// Runs share no mutable state beyond the store, whose writes are all
/// conditional, so concurrent or duplicate invocations for the same
/// event are safe.
pub struct ReceiptProcessor {
    analyzer: Box<dyn ExpenseAnalyzer + Send + Sync>,
    store: Box<dyn ReceiptStore + Send>,
    dispatcher: NotificationDispatcher,
}

impl ReceiptProcessor {
    pub fn new(
        analyzer: Box<dyn ExpenseAnalyzer + Send + Sync>,
        store: Box<dyn ReceiptStore + Send>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            analyzer,
            store,
            dispatcher,
        }
    }

    /// Process a single upload event end to end.
    ///
    /// The receipt id is derived from event identity before any stage
    /// runs, so redelivery always operates on the same record. A run
    /// that fails here left nothing durable and may be redelivered
    /// safely; once the record is stored, notification problems no
    /// longer fail the run.
    pub fn process(&self, event: &UploadEvent) -> Result<ProcessingOutcome, ProcessingError> {
        validate(event)?;

        let receipt_id = event.receipt_id();
        let _span = tracing::info_span!("process_receipt", receipt_id = %receipt_id).entered();

        // Redelivery fast path: skip extraction when the record is
        // already durable.
        if let Some(existing) = self.store.get(&receipt_id)? {
            tracing::info!(
                status = existing.status.as_str(),
                "event redelivered for existing record"
            );
            return Ok(self.notify_and_summarize(existing, true));
        }

        tracing::info!(
            container = %event.container,
            object_key = %event.object_key,
            "starting extraction"
        );
        let analysis = self.analyzer.analyze(&event.container, &event.object_key)?;

        let mut record = normalize(event, receipt_id, &analysis, Utc::now())?;
        record.status = ReceiptStatus::Extracted;
        tracing::info!(
            status = record.status.as_str(),
            line_items = record.line_items.len(),
            low_confidence = record.low_confidence,
            total_mismatch = record.total_mismatch,
            "analysis normalized"
        );

        record.status = ReceiptStatus::Stored;
        self.store.store(&record)?;
        tracing::info!("record stored");

        Ok(self.notify_and_summarize(record, false))
    }

    /// Best-effort notification phase. Never fails the run: the stored
    /// record is the success criterion.
    fn notify_and_summarize(&self, mut record: ReceiptRecord, replayed: bool) -> ProcessingOutcome {
        let already_done = record.status == ReceiptStatus::Notified
            || record.notification_status == NotificationStatus::Sent;

        if !already_done {
            let outcome = self.dispatcher.dispatch(&record);
            if let Err(e) = self.store.record_notification(&record.receipt_id, outcome) {
                tracing::warn!(error = %e, "failed to record notification outcome");
            }
            record.notification_status = outcome;

            if outcome == NotificationStatus::Sent {
                match self.store.transition(
                    &record.receipt_id,
                    ReceiptStatus::Stored,
                    ReceiptStatus::Notified,
                ) {
                    Ok(()) => record.status = ReceiptStatus::Notified,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to advance status after send")
                    }
                }
            }
        }

        ProcessingOutcome::from_record(&record, replayed)
    }
}

/// Pre-flight event validation: runs before any external call.
fn validate(event: &UploadEvent) -> Result<(), ProcessingError> {
    if event.container.trim().is_empty() || event.object_key.trim().is_empty() {
        return Err(ProcessingError::Validation(
            "container and object_key must be non-empty".into(),
        ));
    }
    if !event.has_supported_suffix() {
        return Err(ProcessingError::Validation(format!(
            "unsupported object suffix: {}",
            event.object_key
        )));
    }
    Ok(())
}
