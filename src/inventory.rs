//! Materialized-asset inventory.
//!
//! Answers one question: which dates already have an output asset? The
//! answer distinguishes a confirmed-empty window from a window the remote
//! never reported on, so the caller can tell "nothing materialized" apart
//! from "no idea what materialized".

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dates::date_from_millis;
use crate::remote::{run_with_retry, RemoteService, RetryPolicy};

/// Outcome of an inventory fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryReport {
    /// The remote answered; these dates hold materialized assets. An
    /// empty set is a real answer, not a failure.
    Confirmed(BTreeSet<NaiveDate>),
    /// The remote never answered within the retry budget. Nothing can be
    /// concluded about the window.
    Unknown,
}

/// Inventory of materialized output assets for one collection.
pub struct OutputInventory {
    remote: Arc<dyn RemoteService>,
    policy: RetryPolicy,
}

impl OutputInventory {
    /// Create an inventory over `remote` with the default retry policy.
    pub fn new(remote: Arc<dyn RemoteService>) -> Self {
        Self {
            remote,
            policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for inventory fetches.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dates within `[start, end]` that hold a materialized asset in
    /// `collection`.
    pub async fn materialized_dates(
        &self,
        collection: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> InventoryReport {
        let remote = Arc::clone(&self.remote);
        let result = run_with_retry(self.policy, "asset_dates", || {
            remote.asset_dates(collection, start, end)
        })
        .await;
        match result {
            Ok(timestamps) => {
                let dates: BTreeSet<NaiveDate> = timestamps
                    .into_iter()
                    .filter_map(date_from_millis)
                    .collect();
                debug!(collection, count = dates.len(), "Fetched asset inventory");
                InventoryReport::Confirmed(dates)
            }
            Err(err) => {
                warn!(collection, %err, "Asset inventory unavailable");
                InventoryReport::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::remote::{JobRef, RemoteError, SubmitRequest};
    use crate::Job;

    struct ScriptedRemote {
        responses: Mutex<Vec<Result<Vec<i64>, RemoteError>>>,
    }

    #[async_trait]
    impl RemoteService for ScriptedRemote {
        async fn submit(&self, _request: &SubmitRequest) -> Result<JobRef, RemoteError> {
            unimplemented!()
        }

        async fn list_jobs(&self) -> Result<Vec<Job>, RemoteError> {
            unimplemented!()
        }

        async fn delete_asset(&self, _path: &str) -> Result<(), RemoteError> {
            unimplemented!()
        }

        async fn asset_exists(&self, _path: &str) -> Result<bool, RemoteError> {
            unimplemented!()
        }

        async fn asset_dates(
            &self,
            _collection: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<i64>, RemoteError> {
            self.responses.lock().unwrap().remove(0)
        }

        async fn source_scene_count(
            &self,
            _path: &str,
            _date: NaiveDate,
        ) -> Result<i64, RemoteError> {
            unimplemented!()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_confirmed_dates() {
        let remote = Arc::new(ScriptedRemote {
            // 2023-01-05 and 2023-01-06, mid-day
            responses: Mutex::new(vec![Ok(vec![1_672_876_800_000, 1_673_006_400_000])]),
        });
        let report = OutputInventory::new(remote)
            .materialized_dates("drought", d(2023, 1, 1), d(2023, 1, 31))
            .await;
        let expected: BTreeSet<_> = [d(2023, 1, 5), d(2023, 1, 6)].into_iter().collect();
        assert_eq!(report, InventoryReport::Confirmed(expected));
    }

    #[tokio::test]
    async fn test_empty_window_is_confirmed() {
        let remote = Arc::new(ScriptedRemote {
            responses: Mutex::new(vec![Ok(vec![])]),
        });
        let report = OutputInventory::new(remote)
            .materialized_dates("drought", d(2023, 1, 1), d(2023, 1, 31))
            .await;
        assert_eq!(report, InventoryReport::Confirmed(BTreeSet::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_fetch_is_unknown() {
        let responses = (0..4)
            .map(|_| Err(RemoteError::Transport("reset".to_string())))
            .collect();
        let remote = Arc::new(ScriptedRemote {
            responses: Mutex::new(responses),
        });
        let report = OutputInventory::new(remote)
            .materialized_dates("drought", d(2023, 1, 1), d(2023, 1, 31))
            .await;
        assert_eq!(report, InventoryReport::Unknown);
    }
}
