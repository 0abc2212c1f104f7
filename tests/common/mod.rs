//! Shared mock remote service for integration tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;

use geoexport::remote::{JobRef, RemoteError, RemoteService, SubmitRequest};
use geoexport::{Job, JobState};

/// Scriptable in-memory stand-in for the remote batch-job service.
///
/// Jobs, assets, and scene counts are plain collections behind mutexes;
/// tests set them up front and inspect them afterwards. Failure
/// injection is count-based: the next N calls of a kind fail, then the
/// service recovers.
pub struct MockRemote {
    /// Jobs returned by every directory listing
    pub jobs: Mutex<Vec<Job>>,
    /// Epoch-millisecond timestamps of materialized assets
    pub asset_timestamps: Mutex<Vec<i64>>,
    /// Paths of existing output assets
    pub existing_assets: Mutex<Vec<String>>,
    /// Scene count answered for every source lookup
    pub scene_count: Mutex<i64>,
    /// Submissions the service accepted, in order
    pub submitted: Mutex<Vec<SubmitRequest>>,
    /// Asset paths deleted, in order
    pub deleted: Mutex<Vec<String>>,
    /// Listing calls that fail before the service recovers
    pub listing_failures: Mutex<u32>,
    /// Inventory calls that fail before the service recovers
    pub inventory_failures: Mutex<u32>,
    /// Submit calls that fail before the service recovers
    pub submit_failures: Mutex<u32>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            asset_timestamps: Mutex::new(Vec::new()),
            existing_assets: Mutex::new(Vec::new()),
            scene_count: Mutex::new(24),
            submitted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            listing_failures: Mutex::new(0),
            inventory_failures: Mutex::new(0),
            submit_failures: Mutex::new(0),
        }
    }
}

impl MockRemote {
    /// Add an in-flight job labeled for `collection` and `date`.
    pub fn push_job(&self, id: &str, collection: &str, date: NaiveDate, state: JobState) {
        self.jobs.lock().unwrap().push(Job {
            id: id.to_string(),
            description: format!("append - {collection} - {}", date.format("%Y%m%d")),
            state,
        });
    }

    /// Mark `date` as materialized in the output collection.
    pub fn push_asset(&self, date: NaiveDate) {
        let millis = date
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        self.asset_timestamps.lock().unwrap().push(millis);
    }

    fn take_failure(counter: &Mutex<u32>) -> bool {
        let mut failures = counter.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            true
        } else {
            false
        }
    }

    fn transient() -> RemoteError {
        RemoteError::Api {
            status: 400,
            message: "User memory capacity exceeded".to_string(),
        }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobRef, RemoteError> {
        if Self::take_failure(&self.submit_failures) {
            return Err(Self::transient());
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(request.clone());
        Ok(JobRef {
            id: format!("op-{}", submitted.len()),
        })
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RemoteError> {
        if Self::take_failure(&self.listing_failures) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn delete_asset(&self, path: &str) -> Result<(), RemoteError> {
        self.deleted.lock().unwrap().push(path.to_string());
        self.existing_assets.lock().unwrap().retain(|p| p != path);
        Ok(())
    }

    async fn asset_exists(&self, path: &str) -> Result<bool, RemoteError> {
        Ok(self.existing_assets.lock().unwrap().iter().any(|p| p == path))
    }

    async fn asset_dates(
        &self,
        _collection: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<i64>, RemoteError> {
        if Self::take_failure(&self.inventory_failures) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        let start_ms = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis();
        let end_ms = end
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        Ok(self
            .asset_timestamps
            .lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|ms| (start_ms..=end_ms).contains(ms))
            .collect())
    }

    async fn source_scene_count(&self, _path: &str, _date: NaiveDate) -> Result<i64, RemoteError> {
        Ok(*self.scene_count.lock().unwrap())
    }
}
