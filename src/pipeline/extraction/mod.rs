pub mod client;
pub mod types;

pub use client::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("OCR service is unreachable at {0}")]
    Unreachable(String),

    #[error("OCR request timed out after {0}s")]
    Timeout(u64),

    #[error("OCR service throttled the request")]
    Throttled,

    #[error("OCR service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("document not supported by the OCR service: {0}")]
    UnsupportedDocument(String),

    #[error("access denied to source object: {0}")]
    AccessDenied(String),

    #[error("analysis contained no field detections and no line items")]
    EmptyAnalysis,

    #[error("response parsing error: {0}")]
    ResponseParsing(String),
}

impl ExtractionError {
    /// Transient failures worth another attempt within the retry budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExtractionError::Unreachable(_)
                | ExtractionError::Timeout(_)
                | ExtractionError::Throttled
                | ExtractionError::Service { status: 500..=599, .. }
        )
    }
}
