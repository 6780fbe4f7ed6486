use serde::Serialize;

use super::types::{ExpenseAnalysis, ExpenseAnalyzer};
use super::ExtractionError;
use crate::pipeline::retry::RetryPolicy;

/// HTTP client for the expense-analysis service.
///
/// Stateless beyond the connection pool; transient failures (throttling,
/// timeouts, 5xx) are retried with bounded exponential backoff, anything
/// else fails immediately.
pub struct HttpExpenseClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    retry: RetryPolicy,
}

/// Request body for the analyze-expense endpoint.
#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    container: &'a str,
    object_key: &'a str,
}

impl HttpExpenseClient {
    pub fn new(base_url: &str, timeout_secs: u64, retry: RetryPolicy) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
            retry,
        }
    }

    fn analyze_once(
        &self,
        container: &str,
        object_key: &str,
    ) -> Result<ExpenseAnalysis, ExtractionError> {
        let url = format!("{}/analyze-expense", self.base_url);
        let body = AnalyzeRequest {
            container,
            object_key,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::Unreachable(self.base_url.clone())
            } else if e.is_timeout() {
                ExtractionError::Timeout(self.timeout_secs)
            } else {
                ExtractionError::Service {
                    status: 0,
                    body: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(match status.as_u16() {
                429 => ExtractionError::Throttled,
                403 => ExtractionError::AccessDenied(body),
                415 | 422 => ExtractionError::UnsupportedDocument(body),
                code => ExtractionError::Service { status: code, body },
            });
        }

        response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))
    }
}

impl ExpenseAnalyzer for HttpExpenseClient {
    fn analyze(
        &self,
        container: &str,
        object_key: &str,
    ) -> Result<ExpenseAnalysis, ExtractionError> {
        let analysis = self.retry.run("ocr_analyze", ExtractionError::is_transient, || {
            self.analyze_once(container, object_key)
        })?;

        if analysis.is_empty() {
            return Err(ExtractionError::EmptyAnalysis);
        }
        Ok(analysis)
    }
}

/// Mock analyzer for testing — returns a configurable result and counts
/// calls so tests can assert that rejected events trigger none.
pub struct MockExpenseAnalyzer {
    result: std::sync::Mutex<ScriptedResult>,
    calls: std::sync::atomic::AtomicUsize,
}

enum ScriptedResult {
    Analysis(ExpenseAnalysis),
    /// Fail this many more times with a throttle, then succeed.
    ThrottleThenSucceed(u32, ExpenseAnalysis),
    Fail(fn() -> ExtractionError),
}

impl MockExpenseAnalyzer {
    pub fn returning(analysis: ExpenseAnalysis) -> Self {
        Self {
            result: std::sync::Mutex::new(ScriptedResult::Analysis(analysis)),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(error: fn() -> ExtractionError) -> Self {
        Self {
            result: std::sync::Mutex::new(ScriptedResult::Fail(error)),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn throttled_then(failures: u32, analysis: ExpenseAnalysis) -> Self {
        Self {
            result: std::sync::Mutex::new(ScriptedResult::ThrottleThenSucceed(failures, analysis)),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ExpenseAnalyzer for MockExpenseAnalyzer {
    fn analyze(&self, _container: &str, _key: &str) -> Result<ExpenseAnalysis, ExtractionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut scripted = self.result.lock().expect("mock lock");
        match &mut *scripted {
            ScriptedResult::Analysis(analysis) => {
                if analysis.is_empty() {
                    return Err(ExtractionError::EmptyAnalysis);
                }
                Ok(analysis.clone())
            }
            ScriptedResult::ThrottleThenSucceed(remaining, analysis) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(ExtractionError::Throttled)
                } else {
                    Ok(analysis.clone())
                }
            }
            ScriptedResult::Fail(make) => Err(make()),
        }
    }
}
