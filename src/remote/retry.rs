//! Retry wrapper for single remote calls.
//!
//! Every wrapped attempt runs under its own deadline, transient failures
//! sleep on a cubic schedule before the next attempt, and permanent
//! failures return immediately. [`eval_or_default`] adds the degraded
//! mode used by evaluation calls: when the budget runs out the caller's
//! default value stands in for the answer.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{cubic_backoff, EVAL_MAX_ATTEMPTS, PER_CALL_TIMEOUT};

use super::{FailureClass, RemoteError};

/// Retry budget and per-attempt deadline for a wrapped remote call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Deadline applied to each individual attempt
    pub per_call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: EVAL_MAX_ATTEMPTS,
            per_call_timeout: PER_CALL_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget and the default deadline.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Run `call` until it succeeds, the failure is permanent, or the attempt
/// budget is exhausted.
///
/// `what` names the operation in log lines. Attempt `n` sleeps `n³`
/// seconds before attempt `n + 1`; the final attempt's error is returned
/// unchanged.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.per_call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(policy.per_call_timeout)),
        };
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match err.class() {
            FailureClass::NonRetryable => {
                warn!(what, %err, "Remote call failed permanently");
                return Err(err);
            }
            FailureClass::Retryable if attempt >= policy.max_attempts => {
                warn!(
                    what,
                    attempts = policy.max_attempts,
                    %err,
                    "Remote call exhausted its retry budget"
                );
                return Err(err);
            }
            FailureClass::Retryable => {
                let backoff = cubic_backoff(attempt);
                debug!(what, attempt, backoff_secs = backoff.as_secs(), %err, "Retrying remote call");
                crate::metrics::record_remote_retry(what, attempt);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Like [`run_with_retry`], but any final failure collapses to `default`.
///
/// This is the evaluation-call mode: a reconciliation cycle should keep
/// going with a sentinel answer rather than die because one lookup never
/// came back.
pub async fn eval_or_default<T, F, Fut>(policy: RetryPolicy, what: &str, default: T, call: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    match run_with_retry(policy, what, call).await {
        Ok(value) => value,
        Err(err) => {
            warn!(what, %err, "Falling back to default value");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn capacity_error() -> RemoteError {
        RemoteError::Api {
            status: 400,
            message: "User memory capacity exceeded".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let result = run_with_retry(RetryPolicy::default(), "scene_count", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(capacity_error())
                } else {
                    Ok(24_i64)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 24);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs on the cubic schedule: 1s + 8s
        assert_eq!(started.elapsed().as_secs(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_returns_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<i64, _> = run_with_retry(RetryPolicy::default(), "scene_count", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RemoteError::Api {
                    status: 400,
                    message: "Image.load: not found".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<i64, _> = run_with_retry(
            RetryPolicy::with_max_attempts(3),
            "scene_count",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(capacity_error()) }
            },
        )
        .await;
        assert!(matches!(result, Err(RemoteError::Api { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            per_call_timeout: Duration::from_secs(5),
        };
        let result = run_with_retry(policy, "asset_dates", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    // Never resolves within the deadline
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(vec![1_i64])
            }
        })
        .await;
        assert_eq!(result.unwrap(), vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eval_or_default_falls_back() {
        let value = eval_or_default(
            RetryPolicy::with_max_attempts(2),
            "scene_count",
            -1_i64,
            || async { Err(capacity_error()) },
        )
        .await;
        assert_eq!(value, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eval_or_default_passes_through_success() {
        let value = eval_or_default(RetryPolicy::default(), "scene_count", -1_i64, || async {
            Ok(23)
        })
        .await;
        assert_eq!(value, 23);
    }
}
