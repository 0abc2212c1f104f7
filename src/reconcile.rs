//! Worklist computation.
//!
//! Candidate dates are filtered in two stages, in-flight jobs first and
//! materialized assets second. Stage order matters: a job can finish and
//! materialize between the two remote reads, and reading the job
//! directory first means such a date is caught by the asset filter
//! instead of slipping through both.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::Job;

/// Dates with an in-flight job for `collection`, extracted from a job
/// directory listing via the label schema.
///
/// Jobs whose description does not parse as a label, or whose label
/// names a different collection, are ignored.
pub fn in_flight_dates(jobs: &BTreeMap<String, Job>, collection: &str) -> BTreeSet<NaiveDate> {
    jobs.values()
        .filter_map(|job| job.label())
        .filter(|label| label.collection == collection)
        .map(|label| label.date)
        .collect()
}

/// Order-preserving deduplication of a candidate list; the first
/// occurrence of each date keeps its position.
pub fn dedup(candidates: impl IntoIterator<Item = NaiveDate>) -> Vec<NaiveDate> {
    let mut seen = BTreeSet::new();
    candidates
        .into_iter()
        .filter(|date| seen.insert(*date))
        .collect()
}

/// Stage one: drop candidates that already have an in-flight job.
pub fn filter_in_flight(
    candidates: impl IntoIterator<Item = NaiveDate>,
    in_flight: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    candidates
        .into_iter()
        .filter(|date| !in_flight.contains(date))
        .collect()
}

/// Stage two: drop candidates that already have a materialized asset.
pub fn filter_materialized(
    candidates: Vec<NaiveDate>,
    materialized: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    candidates
        .into_iter()
        .filter(|date| !materialized.contains(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobState;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dates(days: &[u32]) -> BTreeSet<NaiveDate> {
        days.iter().map(|&day| d(2023, 1, day)).collect()
    }

    fn job_map(entries: &[(&str, &str)]) -> BTreeMap<String, Job> {
        entries
            .iter()
            .map(|(id, description)| {
                (
                    description.to_string(),
                    Job {
                        id: id.to_string(),
                        description: description.to_string(),
                        state: JobState::Ready,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_in_flight_dates_respects_collection_and_schema() {
        let jobs = job_map(&[
            ("1", "append - drought - 20230102"),
            ("2", "append - precip - 20230103"),
            ("3", "manual backfill job"),
        ]);
        assert_eq!(in_flight_dates(&jobs, "drought"), dates(&[2]));
    }

    #[test]
    fn test_two_stage_filter() {
        let candidates = dedup((1..=5).map(|day| d(2023, 1, day)));
        let after_jobs = filter_in_flight(candidates, &dates(&[2]));
        let worklist = filter_materialized(after_jobs, &dates(&[3, 4]));
        assert_eq!(worklist, vec![d(2023, 1, 1), d(2023, 1, 5)]);
    }

    #[test]
    fn test_dedup_preserves_first_position() {
        let candidates = vec![d(2023, 1, 2), d(2023, 1, 1), d(2023, 1, 2), d(2023, 1, 3)];
        assert_eq!(
            dedup(candidates),
            vec![d(2023, 1, 2), d(2023, 1, 1), d(2023, 1, 3)]
        );
    }

    #[test]
    fn test_candidate_order_survives_filtering() {
        // Reverse-chronological candidates stay reverse-chronological
        let candidates = (1..=5).rev().map(|day| d(2023, 1, day));
        let worklist = filter_in_flight(candidates, &dates(&[3]));
        assert_eq!(
            worklist,
            vec![d(2023, 1, 5), d(2023, 1, 4), d(2023, 1, 2), d(2023, 1, 1)]
        );
    }

    #[test]
    fn test_everything_filtered_yields_empty_worklist() {
        let candidates = (1..=3).map(|day| d(2023, 1, day));
        let after_jobs = filter_in_flight(candidates, &dates(&[1, 2]));
        assert!(filter_materialized(after_jobs, &dates(&[3])).is_empty());
    }
}
