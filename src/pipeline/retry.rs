use std::fmt::Display;
use std::time::Duration;

/// Bounded exponential backoff for calls to external collaborators.
///
/// Every external call in the pipeline (OCR service, store, mail relay)
/// runs under one of these budgets, so no stage can hang or retry forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the given retry (0-based), doubling up to the cap.
    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying while `is_retryable` says the failure is
    /// transient and attempts remain. Returns the last error on
    /// exhaustion; non-retryable errors propagate immediately.
    pub fn run<T, E, F>(
        &self,
        what: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt + 1 < attempts => {
                    tracing::warn!(
                        what,
                        attempt = attempt + 1,
                        error = %e,
                        "transient failure, retrying"
                    );
                    std::thread::sleep(self.delay_for(attempt));
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.expect("loop ran at least once"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Fatal => write!(f, "fatal"),
            }
        }
    }

    fn retryable(e: &TestError) -> bool {
        matches!(e, TestError::Transient)
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0u32);
        let result = RetryPolicy::immediate(3).run("test", retryable, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(TestError::Transient)
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausts_budget_and_returns_last_error() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = RetryPolicy::immediate(3).run("test", retryable, || {
            calls.set(calls.get() + 1);
            Err(TestError::Transient)
        });
        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn fatal_error_fails_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = RetryPolicy::immediate(5).run("test", retryable, || {
            calls.set(calls.get() + 1);
            Err(TestError::Fatal)
        });
        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
        assert_eq!(policy.delay_for(10), Duration::from_millis(300));
    }
}
