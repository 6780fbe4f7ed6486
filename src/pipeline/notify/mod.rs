pub mod compose;
pub mod dispatcher;
pub mod mailer;

pub use compose::*;
pub use dispatcher::*;
pub use mailer::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("mail relay is unreachable at {0}")]
    Unreachable(String),

    #[error("mail send timed out after {0}s")]
    Timeout(u64),

    #[error("mail relay throttled the request")]
    Throttled,

    #[error("permanent send failure (status {status}): {body}")]
    Permanent { status: u16, body: String },

    #[error("mail relay error (status {status}): {body}")]
    Relay { status: u16, body: String },
}

impl NotifyError {
    /// Provider throttling and outages are retried; address-level
    /// rejections are permanent and are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NotifyError::Unreachable(_)
                | NotifyError::Timeout(_)
                | NotifyError::Throttled
                | NotifyError::Relay { .. }
        )
    }
}
