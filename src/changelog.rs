//! Turns a Jira changelog into ordered status and sprint transitions.

use crate::jira_types::Status;
use crate::models::{parse_jira_timestamp, Changelog, ChangelogItem, ParseError};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub timestamp: DateTime<FixedOffset>,
    /// `None` when the board column name could not be mapped.
    pub from: Option<Status>,
    pub to: Option<Status>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SprintTransition {
    pub timestamp: DateTime<FixedOffset>,
    pub from: BTreeSet<i64>,
    pub to: BTreeSet<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transitions {
    pub status: Vec<StatusTransition>,
    pub sprint: Vec<SprintTransition>,
}

/// Scan every history entry for status and sprint field changes.
///
/// Both sequences come back sorted by timestamp. The sort is stable, so
/// entries sharing a timestamp keep their changelog order. Items for any
/// other field are ignored.
pub fn extract_transitions(changelog: &Changelog) -> Result<Transitions, ParseError> {
    let mut transitions = Transitions::default();

    for history in &changelog.histories {
        let timestamp = parse_jira_timestamp(&history.created)?;
        let mut status_seen = false;
        for item in &history.items {
            if item.field_id.as_deref() == Some("status") && !status_seen {
                status_seen = true;
                transitions.status.push(StatusTransition {
                    timestamp,
                    from: item.from_name.as_deref().and_then(Status::from_jira_name),
                    to: item.to_name.as_deref().and_then(Status::from_jira_name),
                });
            }
            if item.field == "Sprint" {
                transitions.sprint.push(sprint_transition(timestamp, item));
            }
        }
    }

    transitions.status.sort_by_key(|t| t.timestamp);
    transitions.sprint.sort_by_key(|t| t.timestamp);
    Ok(transitions)
}

fn sprint_transition(timestamp: DateTime<FixedOffset>, item: &ChangelogItem) -> SprintTransition {
    SprintTransition {
        timestamp,
        from: parse_sprint_ids(item.from.as_deref().unwrap_or_default()),
        to: parse_sprint_ids(item.to.as_deref().unwrap_or_default()),
    }
}

/// Sprint membership is stored as a comma separated list of sprint ids,
/// e.g. `"1, 2"`. Blank tokens are skipped, as are tokens that are not ids.
pub fn parse_sprint_ids(field: &str) -> BTreeSet<i64> {
    field
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(token, "skipping malformed sprint id");
                None
            }
        })
        .collect()
}
