use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(String),

    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: String, value: String },
}

/// Process-wide configuration, loaded once at startup and immutable for
/// the process lifetime. No stage reads the environment ad hoc.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file holding the receipts table.
    pub db_path: PathBuf,
    /// Base URL of the expense-analysis service.
    pub ocr_url: String,
    /// Base URL of the mail relay.
    pub mail_url: String,
    pub sender: String,
    pub recipient: String,
    /// Whether review-flagged records still trigger an email.
    pub notify_on_review: bool,
    /// Per-request timeout for external HTTP calls.
    pub request_timeout_secs: u64,
    /// Retry budget shared by the OCR, store and mail stages.
    pub retry: RetryPolicy,
}

impl Settings {
    /// Load settings from `KVITTO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: PathBuf::from(require("KVITTO_DB_PATH")?),
            ocr_url: require("KVITTO_OCR_URL")?,
            mail_url: require("KVITTO_MAIL_URL")?,
            sender: require("KVITTO_SENDER")?,
            recipient: require("KVITTO_RECIPIENT")?,
            notify_on_review: optional_bool("KVITTO_NOTIFY_ON_REVIEW", true)?,
            request_timeout_secs: optional_u64("KVITTO_REQUEST_TIMEOUT_SECS", 30)?,
            retry: RetryPolicy::default(),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn optional_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidVar {
            name: name.to_string(),
            value,
        }),
    }
}

fn optional_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidVar {
            name: name.to_string(),
            value,
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn missing_var_is_an_error() {
        assert!(matches!(
            require("KVITTO_TEST_DOES_NOT_EXIST"),
            Err(ConfigError::MissingVar(_))
        ));
    }
}
