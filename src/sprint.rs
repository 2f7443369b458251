//! Sprint windows and the classification of issues against them.

use crate::issue::{Issue, IssueTree};
use crate::models::{
    format_timestamp, parse_jira_timestamp, JiraSprint, ParseError, SprintDocument,
    SprintIssueRecord,
};
use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone, PartialEq)]
pub struct Sprint {
    pub id: i64,
    pub name: String,
    pub goal: String,
    pub state: String,
    pub start: DateTime<FixedOffset>,
    /// Completion time when the sprint was closed, otherwise the planned end.
    pub end: DateTime<FixedOffset>,
    pub issues: Option<Vec<IssueTree>>,
}

impl Sprint {
    pub fn from_jira(raw: &JiraSprint) -> Result<Self, ParseError> {
        let missing = |field| ParseError::MissingField {
            record: format!("sprint {}", raw.id),
            field,
        };
        let start = raw.start_date.as_deref().ok_or_else(|| missing("startDate"))?;
        let end = match raw.complete_date.as_deref() {
            Some(complete) => complete,
            None => raw.end_date.as_deref().ok_or_else(|| missing("endDate"))?,
        };

        Ok(Self {
            id: raw.id,
            name: raw.name.clone(),
            goal: raw.goal.clone().unwrap_or_default(),
            state: raw.state.clone(),
            start: parse_jira_timestamp(start)?,
            end: parse_jira_timestamp(end)?,
            issues: None,
        })
    }

    pub fn with_issues(mut self, issues: Vec<IssueTree>) -> Self {
        self.issues = Some(issues);
        self
    }

    /// Added to this sprint at or before it started. Without any record of
    /// being added to this sprint the issue counts as unplanned.
    pub fn planned(&self, issue: &Issue) -> bool {
        issue
            .sprint_metrics
            .additions_to(self.id)
            .any(|addition| addition.timestamp <= self.start)
    }

    /// Went into progress inside the window, or finished inside it without
    /// ever being marked in progress.
    pub fn started_in_sprint(&self, issue: &Issue) -> bool {
        let started = issue
            .status_metrics
            .start
            .is_some_and(|start| self.contains(start));
        started || self.finished_in_sprint(issue)
    }

    pub fn finished_in_sprint(&self, issue: &Issue) -> bool {
        issue.status_metrics.end.is_some_and(|end| self.contains(end))
    }

    pub fn finished_before_sprint_start(&self, issue: &Issue) -> bool {
        issue.status_metrics.end.is_some_and(|end| end < self.start)
    }

    fn contains(&self, time: DateTime<FixedOffset>) -> bool {
        self.start <= time && time <= self.end
    }

    /// Flatten `tree` and annotate each measurable issue. Issues that were
    /// already done before the sprint began are left out.
    pub fn classify(&self, tree: &IssueTree) -> Vec<SprintIssueRecord> {
        tree.leaves(tree.root_id())
            .into_iter()
            .filter_map(|id| {
                let issue = tree.get(id);
                if self.finished_before_sprint_start(issue) {
                    tracing::debug!(sprint = self.id, issue = %issue.name, "skipping issue finished before sprint start");
                    return None;
                }
                Some(SprintIssueRecord {
                    issue: tree.to_record(id),
                    planned: self.planned(issue),
                    started_in_sprint: self.started_in_sprint(issue),
                    finished_in_sprint: self.finished_in_sprint(issue),
                })
            })
            .collect()
    }

    pub fn to_document(&self) -> SprintDocument {
        let issues = self
            .issues
            .iter()
            .flatten()
            .flat_map(|tree| self.classify(tree))
            .collect();
        SprintDocument {
            id: self.id,
            name: self.name.clone(),
            goal: self.goal.clone(),
            state: self.state.clone(),
            start: format_timestamp(&self.start),
            end: format_timestamp(&self.end),
            issues,
        }
    }
}
