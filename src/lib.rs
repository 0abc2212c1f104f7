//! # Geoexport Library
//!
//! A library for reconciling and submitting recurring batch computation jobs
//! to a remote geospatial processing service. Results are materialized as
//! date-stamped assets in an append-only output collection.
//!
//! ## Features
//!
//! - **Reconciliation**: Compute the set of dates that still need work by
//!   subtracting in-flight jobs and already-materialized assets from a
//!   candidate date range
//! - **Idempotent Submission**: Job labels embed the target date, so a date
//!   that is queued or materialized is never submitted twice
//! - **Throttling**: Bound the number of concurrently queued jobs, polling
//!   the remote job directory until capacity frees up
//! - **Retry with Backoff**: Transient remote failures (capacity, rate
//!   limits, timeouts) are retried with cubic backoff
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`remote`] - Remote service boundary: client trait, retry wrapper, job directory
//! - [`inventory`] - Materialized-asset inventory for the output collection
//! - [`dates`] - Calendar date range generation and conversions
//! - [`reconcile`] - Worklist computation from candidates and remote state
//! - [`throttle`] - In-flight job ceiling enforcement
//! - [`submit`] - Per-date submission protocol with overwrite semantics
//! - [`orchestrator`] - One full reconcile-and-submit cycle
//! - [`web`] - HTTP trigger surface
//!
//! ## Control Flow
//!
//! ```text
//! dates -> reconcile (job directory + inventory) -> orchestrator
//!       -> throttle -> submit -> retrying remote call
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Configuration constants and backoff calculation
pub mod config;

/// Calendar date range generation
pub mod dates;

/// Materialized-asset inventory
pub mod inventory;

/// Production observability metrics
pub mod metrics;

/// Reconcile-and-submit cycle driver
pub mod orchestrator;

/// Worklist computation
pub mod reconcile;

/// Remote service boundary
pub mod remote;

/// Per-date submission protocol
pub mod submit;

/// In-flight job ceiling enforcement
pub mod throttle;

/// HTTP trigger surface
pub mod web;

// Re-export commonly used types
pub use orchestrator::{Orchestrator, RunConfig, RunReport};
pub use remote::RemoteService;

/// State of a job as reported by the remote service.
///
/// The wire format uses SCREAMING_CASE strings. `Ready` and `Running` jobs
/// are considered in-flight for reconciliation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted and queued, not yet started
    Ready,
    /// Currently executing
    Running,
    /// Completed successfully
    Done,
    /// Completed with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl JobState {
    /// Whether a job in this state occupies a queue slot.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Ready => "READY",
            JobState::Running => "RUNNING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(JobState::Ready),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            "CANCELLED" => Ok(JobState::Cancelled),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

/// A job as listed by the remote batch-job API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Remote-assigned job identifier
    pub id: String,
    /// Human-readable job description, rendered from a [`JobLabel`] at
    /// submission time
    pub description: String,
    /// Current job state
    pub state: JobState,
}

impl Job {
    /// Parse the typed label out of this job's description, if it matches
    /// the label schema.
    pub fn label(&self) -> Option<JobLabel> {
        JobLabel::parse(&self.description)
    }
}

/// Typed job label: the idempotency key attached to every submission.
///
/// Renders as `append - {collection} - YYYYMMDD`. The 8-digit fixed-width
/// date is what reconciliation maps back to a calendar date, so both the
/// renderer and the parser live on this one type; there is no free-text
/// formatting anywhere else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobLabel {
    /// Logical output collection name (e.g. `allotments-gridmetdrought-longtermblend`)
    pub collection: String,
    /// Calendar date of the work unit
    pub date: NaiveDate,
}

impl JobLabel {
    /// Create a label for one date of one collection.
    pub fn new(collection: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            collection: collection.into(),
            date,
        }
    }

    /// Parse a rendered label back into its structured form.
    ///
    /// Returns `None` when the string does not follow the schema: the
    /// `append - ` prefix, a collection name, and a trailing fixed-width
    /// 8-digit `YYYYMMDD` date separated by ` - `.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("append - ")?;
        let (collection, date_str) = rest.rsplit_once(" - ")?;
        if date_str.len() != 8 || !date_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let date = NaiveDate::parse_from_str(date_str, "%Y%m%d").ok()?;
        if collection.is_empty() {
            return None;
        }
        Some(Self {
            collection: collection.to_string(),
            date,
        })
    }
}

impl fmt::Display for JobLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "append - {} - {}",
            self.collection,
            self.date.format("%Y%m%d")
        )
    }
}

/// One unit of work: a calendar date plus the parameters needed to build
/// the remote submission for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Target calendar date
    pub date: NaiveDate,
    /// Variable to compute (e.g. `long_term_drought_blend`)
    pub variable: String,
    /// Source collections the computation reads from
    pub source_paths: Vec<String>,
    /// Whether a pre-existing output asset should be replaced
    pub overwrite: bool,
}

/// Spatial parameters forwarded to the remote service with every
/// submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialParams {
    /// Export region description understood by the remote service
    pub region: String,
    /// Output scale in meters
    pub scale_m: f64,
    /// Upper bound on pixels per export
    pub max_pixels: u64,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            region: String::new(),
            scale_m: 22.264,
            max_pixels: 10_u64.pow(13),
        }
    }
}
