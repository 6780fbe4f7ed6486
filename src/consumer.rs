//! Generic task-consumer interface over upload events.
//!
//! The pipeline never assumes a specific trigger mechanism, only that
//! delivery is at-least-once: an `EventSource` hands over events one at
//! a time, possibly repeating them, and idempotency keys derived from
//! event identity make the repeats harmless.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::models::UploadEvent;
use crate::pipeline::processor::{ProcessingError, ReceiptProcessor};

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed event on line {line}: {reason}")]
    MalformedEvent { line: usize, reason: String },
}

/// Source of upload events with at-least-once delivery semantics.
pub trait EventSource {
    /// Next event, or None when the source is drained.
    fn next_event(&mut self) -> Result<Option<UploadEvent>, ConsumerError>;
}

/// Reads upload events from a JSON-lines file, one event per line.
/// Blank lines are skipped.
pub struct JsonlEventSource {
    reader: BufReader<File>,
    line: usize,
}

impl JsonlEventSource {
    pub fn open(path: &Path) -> Result<Self, ConsumerError> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            line: 0,
        })
    }
}

impl EventSource for JsonlEventSource {
    fn next_event(&mut self) -> Result<Option<UploadEvent>, ConsumerError> {
        loop {
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| ConsumerError::MalformedEvent {
                    line: self.line,
                    reason: e.to_string(),
                });
        }
    }
}

/// Counters for one consumer run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub processed: usize,
    pub replayed: usize,
    pub failed: usize,
}

/// Drain an event source through the processor.
///
/// A failed run is logged and counted, never fatal for the consumer:
/// the delivering mechanism owns redelivery and dead-letter policy.
pub fn run(
    source: &mut dyn EventSource,
    processor: &ReceiptProcessor,
) -> Result<ConsumerStats, ConsumerError> {
    let mut stats = ConsumerStats::default();

    while let Some(event) = source.next_event()? {
        match processor.process(&event) {
            Ok(outcome) => {
                if outcome.replayed {
                    stats.replayed += 1;
                } else {
                    stats.processed += 1;
                }
                tracing::info!(
                    receipt_id = %outcome.receipt_id,
                    status = outcome.status.as_str(),
                    notification = outcome.notification_status.as_str(),
                    replayed = outcome.replayed,
                    "event processed"
                );
            }
            Err(e) => {
                stats.failed += 1;
                log_failure(&event, &e);
            }
        }
    }

    Ok(stats)
}

fn log_failure(event: &UploadEvent, error: &ProcessingError) {
    tracing::error!(
        container = %event.container,
        object_key = %event.object_key,
        error = %error,
        "pipeline run failed"
    );
}
