//! Per-date submission protocol.
//!
//! A [`JobSubmitter`] takes one [`WorkItem`] through preprocessing,
//! overwrite handling, and the retried submit call. Preprocessing is an
//! injected capability: the default [`SceneCountPreprocessor`] checks
//! source completeness before building the request, and tests substitute
//! their own.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SUBMIT_MAX_ATTEMPTS;
use crate::remote::{
    eval_or_default, run_with_retry, RemoteError, RemoteService, RetryPolicy, SubmitRequest,
};
use crate::{JobLabel, SpatialParams, WorkItem};

/// Why a date was skipped instead of submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The source scene count never came back
    #[error("could not count source scenes")]
    SceneCountUnavailable,
    /// The source window holds no scenes at all
    #[error("no source scenes available")]
    NoSourceData,
    /// Fewer scenes than the completeness threshold
    #[error("incomplete source data: {found} of {expected} scenes")]
    IncompleteSourceData {
        /// Scenes found in the source window
        found: i64,
        /// Scenes a complete day provides
        expected: i64,
    },
    /// An output asset already exists and overwrite was not requested
    #[error("asset already exists and overwrite is false")]
    AssetExists,
}

/// Errors that mark a date as failed for this cycle.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A remote call failed past its retry budget
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),
}

/// Outcome of attempting one work item.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The job was accepted by the remote service
    Submitted {
        /// Remote-assigned job identifier
        job_id: String,
    },
    /// The date needs no submission this cycle
    Skipped {
        /// Why it was skipped
        reason: SkipReason,
    },
    /// Submission failed; the date stays eligible for the next cycle
    Failed {
        /// The terminal error
        error: SubmitError,
    },
}

/// Builds the remote request for a work item, or decides to skip it.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    /// Produce the submission request for `item`, or a reason to skip.
    async fn build(&self, item: &WorkItem) -> Result<SubmitRequest, SkipReason>;
}

/// Default preprocessor: verifies source completeness by scene count
/// before building the request.
pub struct SceneCountPreprocessor {
    remote: Arc<dyn RemoteService>,
    collection: String,
    spatial: SpatialParams,
    /// Scenes a complete source day provides
    pub expected_scenes: i64,
    /// Minimum scenes accepted for submission
    pub min_scenes: i64,
}

impl SceneCountPreprocessor {
    /// Create a preprocessor for one collection.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        collection: impl Into<String>,
        spatial: SpatialParams,
        expected_scenes: i64,
        min_scenes: i64,
    ) -> Self {
        Self {
            remote,
            collection: collection.into(),
            spatial,
            expected_scenes,
            min_scenes,
        }
    }

    async fn count_scenes(&self, item: &WorkItem) -> i64 {
        let remote = Arc::clone(&self.remote);
        let mut total = 0;
        for path in &item.source_paths {
            let count = eval_or_default(
                RetryPolicy::default(),
                "source_scene_count",
                -1,
                || remote.source_scene_count(path, item.date),
            )
            .await;
            if count < 0 {
                return -1;
            }
            total += count;
        }
        total
    }
}

#[async_trait]
impl Preprocessor for SceneCountPreprocessor {
    async fn build(&self, item: &WorkItem) -> Result<SubmitRequest, SkipReason> {
        let count = self.count_scenes(item).await;
        if count < 0 {
            return Err(SkipReason::SceneCountUnavailable);
        }
        if count == 0 {
            return Err(SkipReason::NoSourceData);
        }
        if count < self.min_scenes {
            return Err(SkipReason::IncompleteSourceData {
                found: count,
                expected: self.expected_scenes,
            });
        }
        let label = JobLabel::new(self.collection.clone(), item.date);
        let mut properties = BTreeMap::new();
        properties.insert("variable".to_string(), json!(item.variable));
        properties.insert(
            "date".to_string(),
            json!(item.date.format("%Y-%m-%d").to_string()),
        );
        properties.insert("scene_count".to_string(), json!(count));
        Ok(SubmitRequest {
            description: label.to_string(),
            target_asset: format!(
                "{}/{}",
                self.collection,
                item.date.format("%Y%m%d")
            ),
            spatial: self.spatial.clone(),
            properties,
        })
    }
}

/// Submits one work item at a time, honoring overwrite semantics.
pub struct JobSubmitter {
    remote: Arc<dyn RemoteService>,
    preprocessor: Arc<dyn Preprocessor>,
}

impl JobSubmitter {
    /// Create a submitter with the given preprocessing capability.
    pub fn new(remote: Arc<dyn RemoteService>, preprocessor: Arc<dyn Preprocessor>) -> Self {
        Self {
            remote,
            preprocessor,
        }
    }

    /// Take `item` through the full submission protocol.
    ///
    /// Order is fixed: preprocess, then resolve any existing output
    /// asset, then submit with the full retry budget. A failed delete
    /// fails the date rather than risking a duplicate append.
    pub async fn submit(&self, item: &WorkItem) -> SubmitOutcome {
        let request = match self.preprocessor.build(item).await {
            Ok(request) => request,
            Err(reason) => {
                info!(date = %item.date, %reason, "Skipping date");
                return SubmitOutcome::Skipped { reason };
            }
        };

        match self.resolve_existing(&request, item.overwrite).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                info!(date = %item.date, %reason, "Skipping date");
                return SubmitOutcome::Skipped { reason };
            }
            Err(error) => {
                warn!(date = %item.date, %error, "Submission failed");
                return SubmitOutcome::Failed { error };
            }
        }

        let remote = Arc::clone(&self.remote);
        let result = run_with_retry(
            RetryPolicy::with_max_attempts(SUBMIT_MAX_ATTEMPTS),
            "submit",
            || remote.submit(&request),
        )
        .await;
        match result {
            Ok(job_ref) => {
                info!(date = %item.date, job_id = %job_ref.id, "Submitted job");
                SubmitOutcome::Submitted { job_id: job_ref.id }
            }
            Err(err) => {
                let error = SubmitError::Remote(err);
                warn!(date = %item.date, %error, "Submission failed");
                SubmitOutcome::Failed { error }
            }
        }
    }

    async fn resolve_existing(
        &self,
        request: &SubmitRequest,
        overwrite: bool,
    ) -> Result<Option<SkipReason>, SubmitError> {
        let remote = Arc::clone(&self.remote);
        let exists = run_with_retry(RetryPolicy::default(), "asset_exists", || {
            remote.asset_exists(&request.target_asset)
        })
        .await?;
        if !exists {
            return Ok(None);
        }
        if !overwrite {
            return Ok(Some(SkipReason::AssetExists));
        }
        info!(asset = %request.target_asset, "Deleting existing asset before overwrite");
        run_with_retry(RetryPolicy::default(), "delete_asset", || {
            remote.delete_asset(&request.target_asset)
        })
        .await?;
        Ok(None)
    }
}
