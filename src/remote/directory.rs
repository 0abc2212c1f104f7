//! Remote job directory.
//!
//! [`JobDirectory`] is the authoritative view of which jobs the account
//! holds and what state each is in. Both the throttle and reconciliation
//! depend on it, so an unavailable directory is a fatal error rather than
//! a degraded answer: guessing at in-flight jobs risks duplicate
//! submissions.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{listing_backoff, LIST_MAX_ATTEMPTS};
use crate::{Job, JobState};

use super::{FailureClass, RemoteError, RemoteService};

/// Errors from a directory listing, after its retry budget is spent.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The listing never succeeded within the retry budget
    #[error("Job directory unavailable after {attempts} attempts: {source}")]
    Unavailable {
        /// Attempts made before giving up
        attempts: u32,
        /// Final error from the remote service
        source: RemoteError,
    },
}

/// Retrying view of the remote job directory, keyed by description.
#[derive(Clone)]
pub struct JobDirectory {
    remote: Arc<dyn RemoteService>,
    max_attempts: u32,
}

impl JobDirectory {
    /// Create a directory over `remote` with the default retry budget.
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self {
            remote,
            max_attempts: LIST_MAX_ATTEMPTS,
        }
    }

    /// Override the listing retry budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// List jobs in any of `states`, keyed by description.
    ///
    /// Jobs are sorted by `(state, description, id)` before keying, so
    /// when several jobs share a description the survivor is
    /// deterministic regardless of service listing order.
    pub async fn list_jobs(
        &self,
        states: &[JobState],
    ) -> Result<BTreeMap<String, Job>, DirectoryError> {
        let jobs = self.list_with_retry().await?;
        let mut matching: Vec<Job> = jobs
            .into_iter()
            .filter(|job| states.contains(&job.state))
            .collect();
        matching.sort_by(|a, b| {
            (a.state, &a.description, &a.id).cmp(&(b.state, &b.description, &b.id))
        });
        debug!(count = matching.len(), ?states, "Listed job directory");
        // Last write wins: later entries in sort order replace earlier ones
        Ok(matching
            .into_iter()
            .map(|job| (job.description.clone(), job))
            .collect())
    }

    /// Number of jobs currently in the `READY` state.
    pub async fn ready_count(&self) -> Result<usize, DirectoryError> {
        Ok(self.list_jobs(&[JobState::Ready]).await?.len())
    }

    async fn list_with_retry(&self) -> Result<Vec<Job>, DirectoryError> {
        let mut attempt = 1;
        loop {
            let err = match self.remote.list_jobs().await {
                Ok(jobs) => return Ok(jobs),
                Err(err) => err,
            };
            if attempt >= self.max_attempts || err.class() == FailureClass::NonRetryable {
                warn!(attempts = attempt, %err, "Job directory listing failed");
                return Err(DirectoryError::Unavailable {
                    attempts: attempt,
                    source: err,
                });
            }
            let backoff = listing_backoff(attempt);
            debug!(attempt, backoff_secs = backoff.as_secs(), %err, "Retrying directory listing");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
