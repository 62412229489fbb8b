//! Retry wrapper for remote store operations
//!
//! Every failure is retried the same way, including ones that cannot succeed
//! on a second attempt (validation or permission errors). The delay grows
//! linearly: `attempt × base_delay`.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempt count and backoff for [`with_retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay after the first failure; later delays are multiples of it
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up
///
/// Returns the last error when every attempt fails.
pub async fn with_retry<T, Fut, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    service = "tuition-sdk",
                    component = "retry",
                    event = "attempt_failed",
                    operation = operation,
                    attempt = attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TuitionError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        let started = Instant::now();
        let calls_ref = &calls;

        let result = with_retry(&policy, "test", move || async move {
            if calls_ref.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TuitionError::Store("offline".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<()> = with_retry(&RetryPolicy::default(), "test", move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TuitionError::Store("offline".to_string()))
        })
        .await;

        assert!(matches!(result, Err(TuitionError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_non_transient_errors_too() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<()> = with_retry(&RetryPolicy::default(), "test", move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TuitionError::Validation("bad input".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let result: Result<()> = with_retry(&RetryPolicy::none(), "test", move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Err(TuitionError::Store("offline".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
