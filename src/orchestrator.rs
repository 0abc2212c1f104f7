//! Reconcile-and-submit cycle driver.
//!
//! One [`Orchestrator::run`] call is one stateless cycle: read the job
//! directory, read the asset inventory, compute the worklist, and submit
//! it under the throttle. Nothing persists between cycles; the remote
//! service is the only source of truth, which is what makes repeated
//! runs idempotent.

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::inventory::{InventoryReport, OutputInventory};
use crate::remote::{DirectoryError, JobDirectory, RemoteService};
use crate::submit::{JobSubmitter, Preprocessor, SceneCountPreprocessor, SubmitOutcome};
use crate::throttle::{SubmissionThrottle, ThrottleError};
use crate::{dates, reconcile, JobState, SpatialParams, WorkItem};

/// Errors that abort a cycle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The job directory never answered; in-flight state is unknowable
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The asset inventory never answered; submitting blind risks
    /// duplicate appends
    #[error("Asset inventory unavailable for {collection}")]
    InventoryUnknown {
        /// Collection whose inventory could not be fetched
        collection: String,
    },

    /// The throttle rejected its configuration
    #[error(transparent)]
    Throttle(#[from] ThrottleError),
}

/// Static description of one dataset pipeline.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Collection name used in job labels and the output asset path
    pub collection: String,
    /// Variable the remote computation produces
    pub variable: String,
    /// Source collections the computation reads from
    pub source_paths: Vec<String>,
    /// Spatial export parameters
    pub spatial: SpatialParams,
    /// Scenes a complete source day provides
    pub expected_scenes: i64,
    /// Minimum scenes accepted for submission
    pub min_scenes: i64,
}

/// Per-run parameters.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// First candidate date, inclusive
    pub start: NaiveDate,
    /// Last candidate date, inclusive
    pub end: NaiveDate,
    /// Replace already-materialized assets
    pub overwrite: bool,
    /// Walk the worklist newest-first
    pub reverse: bool,
    /// Pacing sleep between submissions
    pub delay: Duration,
}

/// What happened to each date in one cycle.
#[derive(Debug, Default)]
pub struct RunReport {
    lines: Vec<String>,
    submitted: usize,
    skipped: usize,
    failed: usize,
}

impl RunReport {
    fn record(&mut self, collection: &str, date: NaiveDate, outcome: &SubmitOutcome) {
        let line = match outcome {
            SubmitOutcome::Submitted { job_id } => {
                self.submitted += 1;
                crate::metrics::record_submission(collection);
                format!("{date} - submitted ({job_id})")
            }
            SubmitOutcome::Skipped { reason } => {
                self.skipped += 1;
                crate::metrics::record_skip(collection, &reason.to_string());
                format!("{date} - skipped: {reason}")
            }
            SubmitOutcome::Failed { error } => {
                self.failed += 1;
                crate::metrics::record_failure(collection);
                format!("{date} - failed: {error}")
            }
        };
        self.lines.push(line);
    }

    /// Per-date outcome lines, in processing order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Dates whose job was accepted.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Dates skipped without a submission.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Dates whose submission failed.
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return write!(f, "nothing to do");
        }
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Runs reconcile-and-submit cycles for one dataset.
pub struct Orchestrator {
    remote: Arc<dyn RemoteService>,
    dataset: DatasetConfig,
    directory: JobDirectory,
    inventory: OutputInventory,
    throttle: SubmissionThrottle,
    preprocessor: Arc<dyn Preprocessor>,
}

impl Orchestrator {
    /// Wire up a cycle driver for `dataset` against `remote`.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        dataset: DatasetConfig,
        ready_ceiling: i64,
    ) -> Result<Self, OrchestratorError> {
        let directory = JobDirectory::new(Arc::clone(&remote));
        let inventory = OutputInventory::new(Arc::clone(&remote));
        let throttle = SubmissionThrottle::new(directory.clone(), ready_ceiling)?;
        let preprocessor = Arc::new(SceneCountPreprocessor::new(
            Arc::clone(&remote),
            dataset.collection.clone(),
            dataset.spatial.clone(),
            dataset.expected_scenes,
            dataset.min_scenes,
        ));
        Ok(Self {
            remote,
            dataset,
            directory,
            inventory,
            throttle,
            preprocessor,
        })
    }

    /// Substitute the preprocessing capability.
    pub fn with_preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Run one full cycle.
    pub async fn run(&self, cfg: &RunConfig) -> Result<RunReport, OrchestratorError> {
        info!(
            collection = %self.dataset.collection,
            start = %cfg.start,
            end = %cfg.end,
            overwrite = cfg.overwrite,
            "Starting reconciliation cycle"
        );

        // Seed the queued-job tally and hold at the gate before any work
        let mut count = self.throttle.ready_count().await?;
        count = self.throttle.gate(count, Duration::ZERO).await?;

        let candidates = reconcile::dedup(dates::date_range(cfg.start, cfg.end, 1));
        let mut worklist = if cfg.overwrite {
            // Overwrite resubmits the whole range; neither remote view
            // can remove a candidate, so neither is read
            candidates
        } else {
            // Stage one: the job directory, read before the inventory so
            // a job finishing mid-cycle lands in the asset filter
            // instead of being missed by both
            let in_flight_jobs = self
                .directory
                .list_jobs(&[JobState::Ready, JobState::Running])
                .await?;
            let in_flight = reconcile::in_flight_dates(&in_flight_jobs, &self.dataset.collection);
            let after_jobs = reconcile::filter_in_flight(candidates, &in_flight);
            if after_jobs.is_empty() {
                info!("No candidate dates remain after the in-flight filter");
                return Ok(RunReport::default());
            }

            // Stage two: the materialized-asset inventory
            let materialized = match self
                .inventory
                .materialized_dates(&self.dataset.collection, cfg.start, cfg.end)
                .await
            {
                InventoryReport::Confirmed(dates) => dates,
                InventoryReport::Unknown => {
                    warn!(collection = %self.dataset.collection, "Aborting cycle: inventory unknown");
                    return Err(OrchestratorError::InventoryUnknown {
                        collection: self.dataset.collection.clone(),
                    });
                }
            };
            reconcile::filter_materialized(after_jobs, &materialized)
        };
        if cfg.reverse {
            worklist.reverse();
        }
        info!(dates = worklist.len(), "Worklist computed");

        let submitter = JobSubmitter::new(Arc::clone(&self.remote), Arc::clone(&self.preprocessor));
        let mut report = RunReport::default();
        for date in worklist {
            let item = WorkItem {
                date,
                variable: self.dataset.variable.clone(),
                source_paths: self.dataset.source_paths.clone(),
                overwrite: cfg.overwrite,
            };
            let outcome = submitter.submit(&item).await;
            if matches!(outcome, SubmitOutcome::Submitted { .. }) {
                count += 1;
            }
            report.record(&self.dataset.collection, date, &outcome);
            // Pace after every item, not just accepted ones; skipped
            // dates still cost remote calls worth spacing out
            count = self.throttle.gate(count, cfg.delay).await?;
        }

        info!(
            submitted = report.submitted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Cycle complete"
        );
        Ok(report)
    }
}
