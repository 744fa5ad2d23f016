//! Bounded retry policy for LLM capability calls (§4.5).
//!
//! Grounded directly on `orca::executor::retry::{RetryConfig, with_retry}`:
//! the same exponential-backoff-with-cap delay calculation and the same
//! attempt-then-sleep-then-retry loop shape, generalized to also apply a
//! per-attempt timeout and to only retry errors the operation itself judges
//! transient (§4.5: "retry is scoped to the transient-error classes").

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::llm::error::LlmError;

/// Exponential-backoff retry policy, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub per_attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            per_attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Run `operation` until it succeeds, exhausts `max_attempts`, or fails with
    /// a non-retryable error. Each attempt is wrapped in `per_attempt_timeout`;
    /// a timed-out attempt is itself treated as `LlmError::Timeout` and retried
    /// like any other transient failure.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt - 1);
                debug!(label, attempt, delay_secs = delay.as_secs(), "retrying llm call");
                sleep(delay).await;
            }

            let outcome = tokio::time::timeout(self.per_attempt_timeout, operation()).await;
            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(format!("{label} exceeded per-attempt timeout"))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    warn!(label, attempt = attempt + 1, %err, "llm call failed, will retry");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Other(format!("{label} exhausted retries"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_grows_exponentially_then_caps() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 2.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = policy
            .run("test", || {
                let attempts = attempts_clone.clone();
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 2 {
                        Err(LlmError::ServiceUnavailable("down".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, LlmError> = policy
            .run("test", || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(LlmError::InvalidRequest("bad schema".into()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<i32, LlmError> = policy
            .run("test", || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(LlmError::Timeout("slow".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(LlmError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
