//! Status and sprint-membership metrics derived from changelog transitions.

use crate::changelog::{SprintTransition, StatusTransition};
use crate::jira_types::Status;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// What `days_taken` should be for an issue that finished without ever
/// being in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationPolicy {
    /// The duration is unknown and `days_taken` stays `None`.
    #[default]
    Indeterminate,
    /// Legacy behaviour: count the issue as one day of work.
    OneDay,
}

impl FromStr for DurationPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "indeterminate" | "null" | "none" => Ok(DurationPolicy::Indeterminate),
            "one_day" | "oneday" | "1" => Ok(DurationPolicy::OneDay),
            other => Err(format!("unknown duration policy {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMetrics {
    pub started: bool,
    pub finished: bool,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub days_taken: Option<i64>,
}

impl StatusMetrics {
    /// `transitions` must already be in chronological order.
    pub fn from_transitions(transitions: &[StatusTransition], policy: DurationPolicy) -> Self {
        let start = transitions
            .iter()
            .find(|t| t.to == Some(Status::InProgress))
            .map(|t| t.timestamp);
        let end = transitions
            .iter()
            .rev()
            .find(|t| t.to == Some(Status::Done))
            .map(|t| t.timestamp);

        let days_taken = match (start, end) {
            (Some(start), Some(end)) => Some(whole_days_rounded_up(start, end)),
            (None, Some(_)) if policy == DurationPolicy::OneDay => Some(1),
            _ => None,
        };

        Self {
            started: start.is_some(),
            finished: end.is_some(),
            start,
            end,
            days_taken,
        }
    }
}

/// Whole days between `start` and `end`, where any leftover seconds count as
/// another day. A done transition recorded before the first in-progress one
/// yields zero rather than a negative duration.
pub fn whole_days_rounded_up(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> i64 {
    let seconds = (end - start).num_seconds();
    let days = seconds.div_euclid(SECONDS_PER_DAY);
    let leftover = seconds.rem_euclid(SECONDS_PER_DAY);
    let rounded = if leftover == 0 { days } else { days + 1 };
    rounded.max(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintAddition {
    pub timestamp: DateTime<FixedOffset>,
    pub sprint_id: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SprintMetrics {
    pub sprint_additions: Vec<SprintAddition>,
}

impl SprintMetrics {
    /// One addition per transition that adds a sprint. Removals produce
    /// nothing. When a single transition adds several sprints at once only
    /// the lowest id is kept.
    pub fn from_transitions(transitions: &[SprintTransition]) -> Self {
        let sprint_additions = transitions
            .iter()
            .filter_map(|t| {
                let mut added = t.to.difference(&t.from);
                let sprint_id = *added.next()?;
                if added.next().is_some() {
                    tracing::debug!(sprint_id, "several sprints added at once, keeping one");
                }
                Some(SprintAddition {
                    timestamp: t.timestamp,
                    sprint_id,
                })
            })
            .collect();
        Self { sprint_additions }
    }

    pub fn additions_to(&self, sprint_id: i64) -> impl Iterator<Item = &SprintAddition> {
        self.sprint_additions
            .iter()
            .filter(move |addition| addition.sprint_id == sprint_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::parse_sprint_ids;
    use crate::models::parse_jira_timestamp;

    fn at(value: &str) -> DateTime<FixedOffset> {
        parse_jira_timestamp(value).unwrap()
    }

    fn status(time: &str, from: Status, to: Status) -> StatusTransition {
        StatusTransition {
            timestamp: at(time),
            from: Some(from),
            to: Some(to),
        }
    }

    fn sprint(time: &str, from: &str, to: &str) -> SprintTransition {
        SprintTransition {
            timestamp: at(time),
            from: parse_sprint_ids(from),
            to: parse_sprint_ids(to),
        }
    }

    #[test]
    fn empty_history_has_no_metrics() {
        let metrics = StatusMetrics::from_transitions(&[], DurationPolicy::Indeterminate);
        assert_eq!(
            metrics,
            StatusMetrics {
                started: false,
                finished: false,
                start: None,
                end: None,
                days_taken: None,
            }
        );
    }

    #[test]
    fn one_minute_of_work_rounds_up_to_a_day() {
        let transitions = [
            status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress),
            status("2020-01-01T09:01:00.000+0100", Status::InProgress, Status::Done),
        ];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate);
        assert!(metrics.started);
        assert!(metrics.finished);
        assert_eq!(metrics.start, Some(at("2020-01-01T09:00:00.000+0100")));
        assert_eq!(metrics.end, Some(at("2020-01-01T09:01:00.000+0100")));
        assert_eq!(metrics.days_taken, Some(1));
    }

    #[test]
    fn exact_days_do_not_round_up() {
        let transitions = [
            status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress),
            status("2020-01-03T09:00:00.000+0100", Status::InProgress, Status::Done),
        ];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate);
        assert_eq!(metrics.days_taken, Some(2));
    }

    #[test]
    fn partial_days_round_up() {
        let start = at("2020-01-01T09:00:00.000+0100");
        assert_eq!(whole_days_rounded_up(start, at("2020-01-03T09:00:01.000+0100")), 3);
        assert_eq!(whole_days_rounded_up(start, at("2020-01-01T09:00:00.000+0100")), 0);
        // Offsets are honoured: 08:00 UTC-1 is 10:00 UTC+1.
        assert_eq!(whole_days_rounded_up(start, at("2020-01-02T08:00:00.000-0100")), 2);
    }

    #[test]
    fn done_before_in_progress_is_not_negative() {
        let start = at("2020-01-05T09:00:00.000+0100");
        assert_eq!(whole_days_rounded_up(start, at("2020-01-01T09:00:00.000+0100")), 0);
    }

    #[test]
    fn unfinished_issue_has_no_end() {
        let transitions = [status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress)];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate);
        assert!(metrics.started);
        assert!(!metrics.finished);
        assert_eq!(metrics.end, None);
        assert_eq!(metrics.days_taken, None);
    }

    #[test]
    fn straight_to_done_is_indeterminate_by_default() {
        let transitions = [status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::Done)];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate);
        assert!(!metrics.started);
        assert!(metrics.finished);
        assert_eq!(metrics.start, None);
        assert_eq!(metrics.days_taken, None);
    }

    #[test]
    fn straight_to_done_counts_one_day_under_legacy_policy() {
        let transitions = [status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::Done)];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::OneDay);
        assert!(!metrics.started);
        assert_eq!(metrics.days_taken, Some(1));

        // Unfinished work stays unknown under either policy.
        let unfinished = [status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress)];
        let metrics = StatusMetrics::from_transitions(&unfinished, DurationPolicy::OneDay);
        assert_eq!(metrics.days_taken, None);
    }

    #[test]
    fn reopened_issue_uses_first_start_and_last_done() {
        let transitions = [
            status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress),
            status("2020-01-02T09:00:00.000+0100", Status::InProgress, Status::Done),
            status("2020-01-03T09:00:00.000+0100", Status::Done, Status::InProgress),
            status("2020-01-04T09:00:00.000+0100", Status::InProgress, Status::Done),
        ];
        let metrics = StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate);
        assert_eq!(metrics.start, Some(at("2020-01-01T09:00:00.000+0100")));
        assert_eq!(metrics.end, Some(at("2020-01-04T09:00:00.000+0100")));
        assert_eq!(metrics.days_taken, Some(3));
    }

    #[test]
    fn derivation_is_repeatable() {
        let transitions = [
            status("2020-01-01T09:00:00.000+0100", Status::Todo, Status::InProgress),
            status("2020-01-02T10:00:00.000+0100", Status::InProgress, Status::Done),
        ];
        assert_eq!(
            StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate),
            StatusMetrics::from_transitions(&transitions, DurationPolicy::Indeterminate)
        );
        let sprints = [sprint("2020-01-01T11:00:00.000+0100", "1", "1, 2")];
        assert_eq!(
            SprintMetrics::from_transitions(&sprints),
            SprintMetrics::from_transitions(&sprints)
        );
    }

    #[test]
    fn sprint_addition_is_recorded() {
        let metrics = SprintMetrics::from_transitions(&[sprint("2020-01-01T11:00:00.000+0100", "1", "1, 2")]);
        assert_eq!(
            metrics.sprint_additions,
            vec![SprintAddition {
                timestamp: at("2020-01-01T11:00:00.000+0100"),
                sprint_id: 2,
            }]
        );
    }

    #[test]
    fn sprint_removal_is_ignored() {
        let metrics = SprintMetrics::from_transitions(&[sprint("2020-01-01T11:00:00.000+0100", "1, 2", "1")]);
        assert!(metrics.sprint_additions.is_empty());
    }

    #[test]
    fn simultaneous_additions_keep_the_lowest_id() {
        let metrics = SprintMetrics::from_transitions(&[sprint("2020-01-01T11:00:00.000+0100", "1", "1, 5, 3")]);
        assert_eq!(metrics.sprint_additions.len(), 1);
        assert_eq!(metrics.sprint_additions[0].sprint_id, 3);
    }

    #[test]
    fn added_ids_never_come_from_the_previous_set() {
        let transitions = [
            sprint("2020-01-01T11:00:00.000+0100", "", "1"),
            sprint("2020-01-02T11:00:00.000+0100", "1", "1, 2"),
            sprint("2020-01-03T11:00:00.000+0100", "1, 2", "2"),
            sprint("2020-01-04T11:00:00.000+0100", "2", "2,,"),
        ];
        let metrics = SprintMetrics::from_transitions(&transitions);
        for (addition, transition) in metrics.sprint_additions.iter().zip(&transitions) {
            assert!(!transition.from.contains(&addition.sprint_id));
        }
        let ids: Vec<i64> = metrics.sprint_additions.iter().map(|a| a.sprint_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(metrics.additions_to(2).count(), 1);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("indeterminate".parse::<DurationPolicy>(), Ok(DurationPolicy::Indeterminate));
        assert_eq!("ONE_DAY".parse::<DurationPolicy>(), Ok(DurationPolicy::OneDay));
        assert!("sometimes".parse::<DurationPolicy>().is_err());
    }
}
