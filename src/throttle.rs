//! In-flight job ceiling enforcement.
//!
//! [`SubmissionThrottle::gate`] runs between submissions. While the count
//! of queued jobs stays under the ceiling only a fixed pacing sleep
//! happens; at the ceiling the gate blocks, polling the job directory
//! until the service drains below the ceiling again.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{MIN_POLL_DELAY, READY_CEILING_MAX};
use crate::remote::{DirectoryError, JobDirectory};

/// Errors from throttle construction.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The requested ceiling exceeds what the remote service permits
    #[error("Ready-job ceiling {requested} exceeds the service maximum of {max}")]
    CeilingTooHigh {
        /// Ceiling the caller asked for
        requested: i64,
        /// Hard service maximum
        max: i64,
    },
}

/// Gate that bounds the number of jobs queued at the remote service.
pub struct SubmissionThrottle {
    directory: JobDirectory,
    // None disables counting; the gate degenerates to a pacing sleep
    ceiling: Option<usize>,
}

impl SubmissionThrottle {
    /// Create a throttle with the given ready-job ceiling.
    ///
    /// A ceiling of zero or below disables counting entirely. Ceilings
    /// above the service maximum of 3000 are rejected.
    pub fn new(directory: JobDirectory, ready_ceiling: i64) -> Result<Self, ThrottleError> {
        if ready_ceiling > READY_CEILING_MAX {
            return Err(ThrottleError::CeilingTooHigh {
                requested: ready_ceiling,
                max: READY_CEILING_MAX,
            });
        }
        let ceiling = usize::try_from(ready_ceiling).ok().filter(|&c| c > 0);
        Ok(Self { directory, ceiling })
    }

    /// Hold until there is room for another submission.
    ///
    /// `current_count` is the caller's running tally of queued jobs; the
    /// return value replaces it. Three cases:
    ///
    /// - counting disabled: sleep `base_delay`, reset the tally to zero
    /// - under the ceiling: return the tally unchanged, no remote call
    /// - at the ceiling: sleep, then poll the directory until the fresh
    ///   `READY` count drops under the ceiling, returning that count
    pub async fn gate(
        &self,
        current_count: usize,
        base_delay: Duration,
    ) -> Result<usize, DirectoryError> {
        let Some(ceiling) = self.ceiling else {
            tokio::time::sleep(base_delay).await;
            return Ok(0);
        };
        if current_count < ceiling {
            return Ok(current_count);
        }
        let poll_delay = base_delay.max(MIN_POLL_DELAY);
        info!(ceiling, "Ready-job ceiling reached, waiting for the queue to drain");
        let wait_started = tokio::time::Instant::now();
        loop {
            tokio::time::sleep(poll_delay).await;
            let count = self.directory.ready_count().await?;
            crate::metrics::record_ready_jobs(count);
            if count < ceiling {
                debug!(count, "Queue drained below the ceiling");
                crate::metrics::record_throttle_wait(wait_started.elapsed());
                return Ok(count);
            }
            debug!(count, ceiling, "Queue still at the ceiling");
        }
    }

    /// Current `READY` count from the directory, for seeding the tally.
    pub async fn ready_count(&self) -> Result<usize, DirectoryError> {
        if self.ceiling.is_none() {
            return Ok(0);
        }
        self.directory.ready_count().await
    }
}
