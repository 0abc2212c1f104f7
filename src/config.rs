//! Configuration constants and backoff calculation.
//!
//! Retry budgets and sleep schedules are fixed at compile time; the remote
//! service publishes no rate-limit headers to adapt to, so the values here
//! mirror the observed capacity behavior of the batch-job API.

use std::time::Duration;

/// Attempts allowed for a single job submission before reporting failure.
pub const SUBMIT_MAX_ATTEMPTS: u32 = 5;

/// Attempts allowed for a wrapped evaluation call before falling back to
/// the caller-supplied default.
pub const EVAL_MAX_ATTEMPTS: u32 = 4;

/// Attempts allowed for a job-directory listing before the listing is
/// treated as fatally unavailable.
pub const LIST_MAX_ATTEMPTS: u32 = 6;

/// Hard upper bound on the configurable in-flight job ceiling. The remote
/// service rejects accounts holding more queued jobs than this.
pub const READY_CEILING_MAX: i64 = 3000;

/// Minimum sleep between job-directory polls while waiting at the ceiling.
pub const MIN_POLL_DELAY: Duration = Duration::from_secs(10);

/// Per-attempt deadline for any single remote call.
pub const PER_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Default rolling-window start offset in days before today.
pub const DEFAULT_START_OFFSET_DAYS: i64 = 60;

/// Default rolling-window end offset in days before today.
pub const DEFAULT_END_OFFSET_DAYS: i64 = 1;

/// Cubic backoff for evaluation and submission retries.
///
/// Attempt numbers are 1-based; attempt 1 sleeps 1s, attempt 2 sleeps 8s,
/// attempt 3 sleeps 27s.
pub fn cubic_backoff(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt).pow(3))
}

/// Quadratic backoff for job-directory listing retries.
///
/// Attempt numbers are 1-based; attempt 1 sleeps 1s, attempt 2 sleeps 4s.
pub fn listing_backoff(attempt: u32) -> Duration {
    Duration::from_secs(u64::from(attempt).pow(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_backoff_schedule() {
        assert_eq!(cubic_backoff(1), Duration::from_secs(1));
        assert_eq!(cubic_backoff(2), Duration::from_secs(8));
        assert_eq!(cubic_backoff(3), Duration::from_secs(27));
        assert_eq!(cubic_backoff(4), Duration::from_secs(64));
    }

    #[test]
    fn test_listing_backoff_schedule() {
        assert_eq!(listing_backoff(1), Duration::from_secs(1));
        assert_eq!(listing_backoff(2), Duration::from_secs(4));
        assert_eq!(listing_backoff(5), Duration::from_secs(25));
    }
}
