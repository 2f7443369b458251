//! Cycle-time statistics over a team's completed issues.

use crate::models::{IssueRecord, DUMP_TIME_FORMAT};
use chrono::NaiveDateTime;

/// Records at or above this quantile of `days_taken` are treated as outliers.
pub const OUTLIER_QUANTILE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    records: Vec<IssueRecord>,
    days_taken: Vec<f64>,
}

impl Forecast {
    /// Keep issues with a known duration that fall below the outlier cap.
    pub fn new(records: Vec<IssueRecord>) -> Self {
        let durations: Vec<f64> = records
            .iter()
            .filter_map(|record| record.days_taken)
            .map(|days| days as f64)
            .collect();
        let cap = quantile(&durations, OUTLIER_QUANTILE);

        let records: Vec<IssueRecord> = records
            .into_iter()
            .filter(|record| match (record.days_taken, cap) {
                (Some(days), Some(cap)) => (days as f64) < cap,
                _ => false,
            })
            .collect();
        let days_taken = records
            .iter()
            .filter_map(|record| record.days_taken)
            .map(|days| days as f64)
            .collect();

        Self { records, days_taken }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IssueRecord] {
        &self.records
    }

    pub fn quantile(&self, q: f64) -> Option<f64> {
        quantile(&self.days_taken, q)
    }

    /// `(story points, days taken)` for issues that were estimated.
    pub fn story_point_pairs(&self) -> Vec<(f64, i64)> {
        self.records
            .iter()
            .filter_map(|record| Some((record.story_points?, record.days_taken?)))
            .collect()
    }
}

/// Linear interpolation between the closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Records that finished inside `[start, end]`; an open bound is unbounded.
/// Records without a parseable finish time only pass when both bounds are
/// open.
pub fn finished_between(
    records: &[IssueRecord],
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Vec<IssueRecord> {
    if start.is_none() && end.is_none() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| {
            let Some(finished) = record
                .end_time
                .as_deref()
                .and_then(|time| NaiveDateTime::parse_from_str(time, DUMP_TIME_FORMAT).ok())
            else {
                return false;
            };
            start.map_or(true, |start| start <= finished) && end.map_or(true, |end| finished <= end)
        })
        .cloned()
        .collect()
}
