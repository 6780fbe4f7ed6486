use serde::Serialize;

use super::NotifyError;

/// A rendered notification ready to hand to the mail relay. Ephemeral:
/// never persisted, its outcome lands on the record's
/// `notification_status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Email service abstraction (allows mocking for tests).
pub trait Mailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError>;
}

impl<M: Mailer> Mailer for std::sync::Arc<M> {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        (**self).send(email)
    }
}

/// HTTP client for the mail relay.
pub struct HttpMailer {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpMailer {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

impl Mailer for HttpMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let url = format!("{}/send", self.base_url);

        let response = self.client.post(&url).json(email).send().map_err(|e| {
            if e.is_connect() {
                NotifyError::Unreachable(self.base_url.clone())
            } else if e.is_timeout() {
                NotifyError::Timeout(self.timeout_secs)
            } else {
                NotifyError::Relay {
                    status: 0,
                    body: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(match status.as_u16() {
            429 => NotifyError::Throttled,
            // Invalid or suppressed address, malformed message: the
            // relay will never accept this, do not retry.
            code @ 400..=499 => NotifyError::Permanent { status: code, body },
            code => NotifyError::Relay { status: code, body },
        })
    }
}

/// Mock mailer for testing — scripted outcomes, captured sends.
pub struct MockMailer {
    mode: std::sync::Mutex<MockMode>,
    sent: std::sync::Mutex<Vec<OutboundEmail>>,
}

enum MockMode {
    Deliver,
    RejectPermanently,
    /// Throttle this many more times, then deliver.
    ThrottleThenDeliver(u32),
}

impl MockMailer {
    pub fn delivering() -> Self {
        Self::with_mode(MockMode::Deliver)
    }

    pub fn rejecting() -> Self {
        Self::with_mode(MockMode::RejectPermanently)
    }

    pub fn throttled_then(failures: u32) -> Self {
        Self::with_mode(MockMode::ThrottleThenDeliver(failures))
    }

    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode: std::sync::Mutex::new(mode),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("mock lock").len()
    }

    pub fn last_sent(&self) -> Option<OutboundEmail> {
        self.sent.lock().expect("mock lock").last().cloned()
    }
}

impl Mailer for MockMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let mut mode = self.mode.lock().expect("mock lock");
        match &mut *mode {
            MockMode::Deliver => {
                self.sent.lock().expect("mock lock").push(email.clone());
                Ok(())
            }
            MockMode::RejectPermanently => Err(NotifyError::Permanent {
                status: 400,
                body: "address suppressed".into(),
            }),
            MockMode::ThrottleThenDeliver(remaining) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(NotifyError::Throttled)
                } else {
                    self.sent.lock().expect("mock lock").push(email.clone());
                    Ok(())
                }
            }
        }
    }
}
