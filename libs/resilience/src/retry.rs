//! Retry executor with exponential backoff
//!
//! The executor does not interpret failure kinds; any failure is retryable by
//! default. Call sites whose failures are definite policy decisions (auth,
//! validation) should not be wrapped in retry at all. Sleeps between attempts
//! hold no lock.

use std::future::Future;
use std::time::Duration;

use crate::metrics::{ResilienceMetrics, RetryOutcome};

/// Immutable backoff policy, passed per call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }
}

/// Attempt `op` up to `policy.max_attempts` times with exponential backoff
/// (no jitter). On exhaustion the last observed failure is re-surfaced
/// unchanged.
pub async fn with_retry<F, Fut, T, E>(
    operation: &str,
    policy: &RetryPolicy,
    metrics: &dyn ResilienceMetrics,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    metrics.record_retry_attempt(operation, RetryOutcome::Success);
                    tracing::info!(operation, attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                metrics.record_retry_attempt(operation, RetryOutcome::Failure);

                if attempt >= max_attempts {
                    tracing::error!(operation, attempt, error = %e, "retry exhausted");
                    return Err(e);
                }

                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after failure"
                );

                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(policy.multiplier).min(policy.max_delay);
            }
        }
    }

    unreachable!("retry loop returns on final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{NoOpMetrics, RecordingMetrics};
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Debug)]
    struct AttemptError(usize);

    impl fmt::Display for AttemptError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "attempt {} failed", self.0)
        }
    }

    impl std::error::Error for AttemptError {}

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn first_attempt_success_does_not_sleep() {
        let start = Instant::now();
        let result: Result<u32, AttemptError> = with_retry(
            "op",
            &fast_policy(3),
            &NoOpMetrics,
            || async { Ok(7) },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn permanent_failure_attempts_exactly_max_and_surfaces_last_error() {
        let attempts = AtomicUsize::new(0);
        let metrics = RecordingMetrics::new();

        let result: Result<(), AttemptError> = with_retry(
            "doomed",
            &fast_policy(3),
            &metrics,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(AttemptError(n)) }
            },
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Final surfaced error is the one from the last attempt
        assert_eq!(result.unwrap_err().to_string(), "attempt 3 failed");
        assert_eq!(metrics.attempts().len(), 3);
        assert!(metrics
            .attempts()
            .iter()
            .all(|(op, outcome)| op == "doomed" && *outcome == RetryOutcome::Failure));
    }

    #[tokio::test]
    async fn delays_follow_exponential_schedule() {
        let attempts = AtomicUsize::new(0);
        let start = Instant::now();

        let _: Result<(), AttemptError> = with_retry(
            "slow",
            &fast_policy(3),
            &NoOpMetrics,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(AttemptError(n)) }
            },
        )
        .await;

        // Two sleeps: 10ms then 20ms
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(15),
            multiplier: 10.0,
        };
        let start = Instant::now();

        let _: Result<(), AttemptError> =
            with_retry("capped", &policy, &NoOpMetrics, || async {
                Err(AttemptError(0))
            })
            .await;

        // Three sleeps of 10, 15, 15ms; an uncapped schedule would be ~1.1s
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn eventual_success_stops_retrying() {
        let attempts = AtomicUsize::new(0);
        let metrics = RecordingMetrics::new();

        let result: Result<&str, AttemptError> = with_retry(
            "flaky",
            &fast_policy(5),
            &metrics,
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(AttemptError(n))
                    } else {
                        Ok("recovered")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let outcomes: Vec<_> = metrics.attempts().into_iter().map(|(_, o)| o).collect();
        assert_eq!(
            outcomes,
            vec![
                RetryOutcome::Failure,
                RetryOutcome::Failure,
                RetryOutcome::Success
            ]
        );
    }
}
