//! Remote service boundary.
//!
//! [`RemoteService`] is the single trait through which the rest of the
//! crate talks to the batch-job API: submitting jobs, listing the job
//! directory, and inspecting assets. An HTTP implementation lives in
//! [`http`]; tests substitute their own.
//!
//! Failure classification happens here too. The remote API reports
//! capacity and contention problems as ordinary error payloads, so
//! [`RemoteError::class`] inspects message text for the known transient
//! signatures alongside the usual transport and status-code checks.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::{Job, SpatialParams};

/// Retrying job-directory view
pub mod directory;

/// HTTP client implementation
pub mod http;

/// Retry wrapper for single remote calls
pub mod retry;

pub use directory::{DirectoryError, JobDirectory};
pub use http::HttpRemote;
pub use retry::{eval_or_default, run_with_retry, RetryPolicy};

/// Message substrings the remote API uses for transient capacity and
/// contention failures.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "capacity exceeded",
    "Too many concurrent aggregations",
    "Computation timed out.",
];

/// Errors from a single remote call, before any retrying.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection-level failure: DNS, TLS, reset, etc.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The per-attempt deadline elapsed before a response arrived
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with an error payload
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// The service answered, but the body did not parse as expected
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient; retry after backoff
    Retryable,
    /// Permanent for this request; retrying would repeat the failure
    NonRetryable,
}

impl RemoteError {
    /// Classify this failure for retry purposes.
    ///
    /// Transport errors and timeouts are always retryable. API errors are
    /// retryable on 429 and 5xx status codes, and on the known transient
    /// message signatures regardless of status.
    pub fn class(&self) -> FailureClass {
        match self {
            RemoteError::Transport(_) | RemoteError::Timeout(_) => FailureClass::Retryable,
            RemoteError::Api { status, message } => {
                if *status == 429 || *status >= 500 {
                    return FailureClass::Retryable;
                }
                if TRANSIENT_SIGNATURES.iter().any(|sig| message.contains(sig)) {
                    return FailureClass::Retryable;
                }
                FailureClass::NonRetryable
            }
            RemoteError::InvalidResponse(_) => FailureClass::NonRetryable,
        }
    }
}

/// Everything needed to submit one batch job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    /// Job description, rendered from a [`crate::JobLabel`]
    pub description: String,
    /// Asset path the job appends its result to
    pub target_asset: String,
    /// Spatial export parameters
    pub spatial: SpatialParams,
    /// Additional properties stamped onto the output asset
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Remote-assigned handle for an accepted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    /// Job identifier, usable for later directory lookups
    pub id: String,
}

/// Client-side view of the remote geospatial batch-job service.
///
/// Implementations perform exactly one call per method invocation; all
/// retry behavior lives in [`retry`] and [`JobDirectory`].
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Submit a batch job. Returns the remote job handle on acceptance.
    async fn submit(&self, request: &SubmitRequest) -> Result<JobRef, RemoteError>;

    /// List every job the account currently holds, in service order.
    async fn list_jobs(&self) -> Result<Vec<Job>, RemoteError>;

    /// Delete an asset. Succeeds only if the asset existed.
    async fn delete_asset(&self, path: &str) -> Result<(), RemoteError>;

    /// Whether an asset exists at `path`.
    async fn asset_exists(&self, path: &str) -> Result<bool, RemoteError>;

    /// Epoch-millisecond timestamps of the assets materialized in
    /// `collection` between `start` and `end`, inclusive.
    async fn asset_dates(
        &self,
        collection: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<i64>, RemoteError>;

    /// Number of source scenes available in `path` for `date`.
    async fn source_scene_count(&self, path: &str, date: NaiveDate) -> Result<i64, RemoteError>;
}
