//! Issue trees: a parent issue together with its subtasks.
//!
//! Issues live in a flat arena and refer to each other by [`IssueId`], so a
//! subtask can look up its parent without the two owning each other. Only the
//! parent can be scheduled into a sprint, which is why subtasks take over the
//! parent's epic and sprint history once the tree is assembled.

use crate::changelog::extract_transitions;
use crate::jira_types::{IssueType, Status};
use crate::metrics::{DurationPolicy, SprintMetrics, StatusMetrics};
use crate::models::{format_timestamp, IssueRecord, JiraIssue, ParseError};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

pub const BAU_LABEL: &str = "bau";
pub const NO_LABEL: &str = "No Label";
pub const NO_DESCRIPTION: &str = "No Description";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No issue document available for {0}")]
    NotFound(String),
    #[error("Fetching {url} failed: {message}")]
    Failed { url: String, message: String },
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Resolves a subtask reference (its `self` url) to the full issue document,
/// changelog included.
pub trait IssueFetcher {
    fn fetch_issue(&self, url: &str) -> Result<JiraIssue, FetchError>;
}

/// Issue documents fetched ahead of time, keyed by their `self` url.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedIssues(HashMap<String, JiraIssue>);

impl PrefetchedIssues {
    pub fn insert(&mut self, url: impl Into<String>, issue: JiraIssue) {
        self.0.insert(url.into(), issue);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IssueFetcher for PrefetchedIssues {
    fn fetch_issue(&self, url: &str) -> Result<JiraIssue, FetchError> {
        self.0
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

impl<F> IssueFetcher for F
where
    F: Fn(&str) -> Result<JiraIssue, FetchError>,
{
    fn fetch_issue(&self, url: &str) -> Result<JiraIssue, FetchError> {
        self(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub name: String,
    pub summary: String,
    pub epic: Option<String>,
    pub issue_type: IssueType,
    pub status: Status,
    pub story_points: Option<f64>,
    pub subtasks: Vec<IssueId>,
    /// Labels other than the BAU marker.
    pub labels: BTreeSet<String>,
    pub bau: bool,
    pub status_metrics: StatusMetrics,
    pub sprint_metrics: SprintMetrics,
    pub parent: Option<IssueId>,
}

impl Issue {
    pub fn is_measurable(&self) -> bool {
        self.subtasks.is_empty() && self.issue_type != IssueType::Epic
    }
}

/// Parses raw issue documents into [`Issue`]s.
#[derive(Debug, Clone)]
pub struct IssueParser {
    story_points_field: String,
    duration_policy: DurationPolicy,
}

impl IssueParser {
    pub fn new(story_points_field: impl Into<String>, duration_policy: DurationPolicy) -> Self {
        Self {
            story_points_field: story_points_field.into(),
            duration_policy,
        }
    }

    /// Parse a single document. Subtask references are not followed.
    pub fn parse_issue(&self, raw: &JiraIssue) -> Result<Issue, ParseError> {
        let fields = &raw.fields;
        let issue_type = IssueType::from_jira_name(&fields.issuetype.name)
            .ok_or_else(|| ParseError::UnknownIssueType(fields.issuetype.name.clone()))?;
        let status = Status::from_jira_name(&fields.status.name)
            .ok_or_else(|| ParseError::UnknownStatus(fields.status.name.clone()))?;

        let epic = fields.parent.as_ref().and_then(|parent| {
            let parent_type = IssueType::from_jira_name(&parent.fields.issuetype.name);
            (parent_type == Some(IssueType::Epic)).then(|| parent.fields.summary.clone())
        });

        let mut labels: BTreeSet<String> = fields.labels.iter().cloned().collect();
        let bau = labels.iter().any(|label| label.eq_ignore_ascii_case(BAU_LABEL));
        labels.retain(|label| !label.eq_ignore_ascii_case(BAU_LABEL));

        let transitions = extract_transitions(&raw.changelog)?;

        Ok(Issue {
            name: raw.key.clone(),
            summary: fields.summary.clone(),
            epic,
            issue_type,
            status,
            story_points: fields.story_points(&self.story_points_field),
            subtasks: Vec::new(),
            labels,
            bau,
            status_metrics: StatusMetrics::from_transitions(&transitions.status, self.duration_policy),
            sprint_metrics: SprintMetrics::from_transitions(&transitions.sprint),
            parent: None,
        })
    }

    /// Parse `raw` and, when a fetcher is given, every subtask beneath it.
    ///
    /// A subtask whose type or status cannot be mapped is dropped with a
    /// warning. Fetch failures abort the whole tree.
    pub fn build_tree(
        &self,
        raw: &JiraIssue,
        fetcher: Option<&dyn IssueFetcher>,
    ) -> Result<IssueTree, BuildError> {
        let mut tree = IssueTree { issues: Vec::new() };
        self.insert(&mut tree, raw, None, fetcher)?;
        tree.propagate_from_parents();
        Ok(tree)
    }

    fn insert(
        &self,
        tree: &mut IssueTree,
        raw: &JiraIssue,
        parent: Option<IssueId>,
        fetcher: Option<&dyn IssueFetcher>,
    ) -> Result<IssueId, BuildError> {
        let mut issue = self.parse_issue(raw)?;
        issue.parent = parent;
        let id = IssueId(tree.issues.len());
        tree.issues.push(issue);

        let Some(fetcher) = fetcher else {
            return Ok(id);
        };
        for subtask in &raw.fields.subtasks {
            let raw_subtask = fetcher.fetch_issue(&subtask.url)?;
            match self.insert(tree, &raw_subtask, Some(id), Some(fetcher)) {
                Ok(child) => tree.issues[id.0].subtasks.push(child),
                Err(BuildError::Parse(error)) => {
                    tracing::warn!(issue = %raw.key, subtask = %raw_subtask.key, %error, "dropping subtask");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueTree {
    issues: Vec<Issue>,
}

impl IssueTree {
    pub fn root_id(&self) -> IssueId {
        IssueId(0)
    }

    pub fn root(&self) -> &Issue {
        &self.issues[0]
    }

    pub fn get(&self, id: IssueId) -> &Issue {
        &self.issues[id.0]
    }

    pub fn subtasks(&self, id: IssueId) -> impl Iterator<Item = &Issue> {
        self.get(id).subtasks.iter().map(|child| self.get(*child))
    }

    pub fn parent(&self, id: IssueId) -> Option<&Issue> {
        self.get(id).parent.map(|parent| self.get(parent))
    }

    /// Parents are always stored before their subtasks, so one forward pass
    /// carries epic and sprint history all the way down.
    fn propagate_from_parents(&mut self) {
        for index in 1..self.issues.len() {
            let Some(parent) = self.issues[index].parent else {
                continue;
            };
            let epic = self.issues[parent.0].epic.clone();
            let sprint_metrics = self.issues[parent.0].sprint_metrics.clone();
            let inherit_labels = {
                let child = &self.issues[index];
                !child.bau && child.labels.is_empty()
            };
            let (parent_bau, parent_labels) = {
                let parent = &self.issues[parent.0];
                (parent.bau, parent.labels.clone())
            };

            let child = &mut self.issues[index];
            child.epic = epic;
            child.sprint_metrics = sprint_metrics;
            if inherit_labels {
                child.bau = parent_bau;
                child.labels = parent_labels;
            }
        }
    }

    fn resolve_label(&self, id: IssueId) -> Option<&str> {
        let issue = self.get(id);
        non_empty(issue.epic.as_deref())
            .or_else(|| issue.parent.and_then(|parent| self.resolve_label(parent)))
            .or_else(|| non_empty(Some(issue.summary.as_str())))
    }

    /// Epic, else the nearest ancestor's label, else the issue's summary.
    pub fn label(&self, id: IssueId) -> &str {
        self.resolve_label(id).unwrap_or(NO_LABEL)
    }

    pub fn description(&self, id: IssueId) -> &str {
        self.resolve_label(id).unwrap_or(NO_DESCRIPTION)
    }

    /// The measurable units of work under `id`, in subtask order. An issue
    /// with subtasks contributes its subtasks, never itself.
    pub fn leaves(&self, id: IssueId) -> Vec<IssueId> {
        let issue = self.get(id);
        if issue.subtasks.is_empty() {
            return vec![id];
        }
        issue
            .subtasks
            .iter()
            .flat_map(|child| self.leaves(*child))
            .collect()
    }

    pub fn to_record(&self, id: IssueId) -> IssueRecord {
        let issue = self.get(id);
        let metrics = &issue.status_metrics;
        IssueRecord {
            issue_type: issue.issue_type,
            name: issue.name.clone(),
            status: issue.status,
            story_points: issue.story_points,
            started: metrics.started,
            finished: metrics.finished,
            start_time: metrics.start.as_ref().map(format_timestamp),
            end_time: metrics.end.as_ref().map(format_timestamp),
            days_taken: metrics.days_taken,
            description: self.description(id).to_string(),
            bau: issue.bau,
            bau_breakdown: issue.labels.iter().cloned().collect(),
        }
    }

    pub fn to_flat_records(&self) -> Vec<IssueRecord> {
        self.leaves(self.root_id())
            .into_iter()
            .map(|id| self.to_record(id))
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
