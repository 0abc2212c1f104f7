//! Calendar date range generation and conversions.
//!
//! Everything here is pure: no clock reads, no remote calls. Callers pass
//! in `today` where a reference date is needed, which keeps the rolling
//! window testable.

use chrono::{DateTime, Days, NaiveDate};

/// Inclusive date range from `start` to `end`, stepping `step_days` days.
///
/// Yields nothing when `end` precedes `start`. A single-day range where
/// `start == end` yields exactly that day.
pub fn date_range(
    start: NaiveDate,
    end: NaiveDate,
    step_days: u64,
) -> impl Iterator<Item = NaiveDate> {
    let step = step_days.max(1);
    std::iter::successors(Some(start), move |d| d.checked_add_days(Days::new(step)))
        .take_while(move |d| *d <= end)
}

/// Convert a remote epoch-millisecond timestamp to its UTC calendar date.
///
/// Returns `None` for timestamps outside the representable range.
pub fn date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Rolling reconciliation window relative to `today`.
///
/// The window covers `today - start_offset_days` through
/// `today - end_offset_days`, inclusive on both sides.
pub fn rolling_window(today: NaiveDate, start_offset_days: i64, end_offset_days: i64) -> (NaiveDate, NaiveDate) {
    (
        today - chrono::Duration::days(start_offset_days),
        today - chrono::Duration::days(end_offset_days),
    )
}
