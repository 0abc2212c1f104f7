//! Integration tests for the submission throttle inside a cycle

mod common;

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use common::MockRemote;
use geoexport::orchestrator::{DatasetConfig, Orchestrator, RunConfig};
use geoexport::{JobState, SpatialParams};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn dataset() -> DatasetConfig {
    DatasetConfig {
        collection: "drought".to_string(),
        variable: "long_term_drought_blend".to_string(),
        source_paths: vec!["gridmet/drought".to_string()],
        spatial: SpatialParams::default(),
        expected_scenes: 24,
        min_scenes: 23,
    }
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_pauses_submissions_until_the_queue_drains() {
    let remote = Arc::new(MockRemote::default());
    let orchestrator = Orchestrator::new(remote.clone(), dataset(), 2).unwrap();
    let cfg = RunConfig {
        start: d(2023, 1, 1),
        end: d(2023, 1, 4),
        overwrite: false,
        reverse: false,
        delay: Duration::ZERO,
    };

    let report = orchestrator.run(&cfg).await.unwrap();

    // The gate held at the ceiling, then the (empty) queue let everything
    // through; nothing is lost, only paced
    assert_eq!(report.submitted(), 4);
    assert_eq!(remote.submitted.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_invalid_ceiling_is_rejected_at_construction() {
    let remote = Arc::new(MockRemote::default());
    assert!(Orchestrator::new(remote, dataset(), 3001).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pre_loop_gate_waits_out_a_full_queue() {
    let remote = Arc::new(MockRemote::default());
    // The account is already at the ceiling before this cycle starts.
    // The queued jobs belong to another collection, so reconciliation
    // still wants all of ours; the gate just has to wait.
    remote.push_job("op-a", "precip", d(2023, 1, 1), JobState::Ready);
    remote.push_job("op-b", "precip", d(2023, 1, 2), JobState::Ready);
    let orchestrator = Orchestrator::new(remote.clone(), dataset(), 2).unwrap();

    let handle = tokio::spawn({
        let remote = remote.clone();
        async move {
            // The queue drains while the gate is polling
            tokio::time::sleep(Duration::from_secs(15)).await;
            remote.jobs.lock().unwrap().clear();
        }
    });

    let cfg = RunConfig {
        start: d(2023, 1, 1),
        end: d(2023, 1, 2),
        overwrite: false,
        reverse: false,
        delay: Duration::ZERO,
    };
    let report = orchestrator.run(&cfg).await.unwrap();
    handle.await.unwrap();

    assert_eq!(report.submitted(), 2);
}
