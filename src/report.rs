//! Sprint summaries: planned/unplanned buckets, delivery and BAU ratios.

use crate::models::{
    BauSummary, SprintAuxiliaryData, SprintDocument, SprintIssueRecord, SprintReportRow,
    SummaryRow,
};
use itertools::Itertools;

pub const PLANNED: &str = "planned";
pub const UNPLANNED: &str = "unplanned";
pub const TOTAL: &str = "Total";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BucketCounts {
    issues: u32,
    delivered: u32,
    bau: u32,
    roadmap: u32,
    roadmap_delivered: u32,
}

impl BucketCounts {
    fn add(&mut self, finished_in_sprint: bool, bau: bool, count: u32) {
        self.issues += count;
        if finished_in_sprint {
            self.delivered += count;
        }
        if bau {
            self.bau += count;
        } else {
            self.roadmap += count;
            if finished_in_sprint {
                self.roadmap_delivered += count;
            }
        }
    }

    fn sum(self, other: Self) -> Self {
        Self {
            issues: self.issues + other.issues,
            delivered: self.delivered + other.delivered,
            bau: self.bau + other.bau,
            roadmap: self.roadmap + other.roadmap,
            roadmap_delivered: self.roadmap_delivered + other.roadmap_delivered,
        }
    }

    fn into_row(self, bucket: &str) -> SummaryRow {
        SummaryRow {
            planned: bucket.to_string(),
            issues_count: self.issues,
            delivered_issues_count: self.delivered,
            bau_issues_count: self.bau,
            delivered_issues_percentage: percentage(self.delivered, self.issues),
            bau_issues_percentage: percentage(self.bau, self.issues),
            roadmap_issues_count: self.roadmap,
            roadmap_delivered_issues_count: self.roadmap_delivered,
            roadmap_delivered_issues_percentage: percentage(self.roadmap_delivered, self.roadmap),
        }
    }
}

/// `100 * numerator / denominator` rounded half-to-even to a whole number.
/// An empty bucket reports 0%.
pub fn percentage(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (100.0 * f64::from(numerator) / f64::from(denominator)).round_ties_even()
}

/// Rows for the planned bucket, the unplanned bucket and the total, in that
/// order. A bucket with no issues is reported as zeros.
pub fn summarise(issues: &[SprintIssueRecord]) -> Vec<SummaryRow> {
    let (planned, unplanned) = bucket_counts(issues);
    vec![
        planned.into_row(PLANNED),
        unplanned.into_row(UNPLANNED),
        planned.sum(unplanned).into_row(TOTAL),
    ]
}

pub fn total_row(issues: &[SprintIssueRecord]) -> SummaryRow {
    let (planned, unplanned) = bucket_counts(issues);
    planned.sum(unplanned).into_row(TOTAL)
}

/// Group by (planned, finished in sprint, BAU), then fold the groups into
/// the planned and unplanned buckets.
fn bucket_counts(issues: &[SprintIssueRecord]) -> (BucketCounts, BucketCounts) {
    let groups = issues
        .iter()
        .counts_by(|record| (record.planned, record.finished_in_sprint, record.issue.bau));

    let mut planned = BucketCounts::default();
    let mut unplanned = BucketCounts::default();
    for ((is_planned, finished_in_sprint, bau), count) in groups {
        let bucket = if is_planned { &mut planned } else { &mut unplanned };
        bucket.add(finished_in_sprint, bau, count as u32);
    }
    (planned, unplanned)
}

/// One row per sprint for cross-sprint comparisons.
pub fn sprint_report(
    team_name: &str,
    sprint: &SprintDocument,
    auxiliary: &SprintAuxiliaryData,
) -> SprintReportRow {
    SprintReportRow {
        summary: total_row(&sprint.issues),
        start_date: sprint.start.clone(),
        end_date: sprint.end.clone(),
        goal_completed: if auxiliary.goal_completed { 100 } else { 0 },
        id: sprint.id,
        team_name: team_name.to_string(),
    }
}

/// The breakdown labels of every BAU issue in the sprint, one entry per
/// label occurrence.
pub fn bau_summary(team_name: &str, sprint: &SprintDocument) -> BauSummary {
    BauSummary {
        id: sprint.id,
        team_name: team_name.to_string(),
        start_date: sprint.start.clone(),
        end_date: sprint.end.clone(),
        bau_summary: sprint
            .issues
            .iter()
            .filter(|record| record.issue.bau)
            .flat_map(|record| record.issue.bau_breakdown.iter().cloned())
            .collect(),
    }
}

/// Count BAU categories across summaries, most frequent first.
pub fn bau_breakdown_counts<'a>(summaries: impl IntoIterator<Item = &'a BauSummary>) -> Vec<(String, usize)> {
    summaries
        .into_iter()
        .flat_map(|summary| summary.bau_summary.iter())
        .counts()
        .into_iter()
        .map(|(category, count)| (category.clone(), count))
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .collect()
}
