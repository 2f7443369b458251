use crate::jira_types::{IssueType, Status};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layout used by the Jira REST and Agile APIs.
pub const JIRA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
/// Timestamp layout of everything this service writes out.
pub const DUMP_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("Unknown issue type {0:?}")]
    UnknownIssueType(String),
    #[error("Unknown status {0:?}")]
    UnknownStatus(String),
    #[error("Missing field {field} on {record}")]
    MissingField { record: String, field: &'static str },
}

pub fn parse_jira_timestamp(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_str(value, JIRA_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map_err(|source| ParseError::Timestamp {
            value: value.to_string(),
            source,
        })
}

pub fn format_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format(DUMP_TIME_FORMAT).to_string()
}

// Raw Jira documents

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SubtaskRef {
    #[serde(rename = "self")]
    pub url: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParentFields {
    pub issuetype: NamedRef,
    #[serde(default)]
    pub summary: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParentRef {
    pub fields: ParentFields,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct JiraIssueFields {
    #[serde(default)]
    pub summary: String,
    pub status: NamedRef,
    pub issuetype: NamedRef,
    #[serde(default)]
    pub subtasks: Vec<SubtaskRef>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub parent: Option<ParentRef>,
    /// Custom fields; story points live in one of these and the field id
    /// differs per Jira instance.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, serde_json::Value>,
}

impl JiraIssueFields {
    pub fn story_points(&self, field_id: &str) -> Option<f64> {
        self.custom.get(field_id).and_then(serde_json::Value::as_f64)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ChangelogItem {
    pub field: String,
    #[serde(rename = "fieldId")]
    pub field_id: Option<String>,
    #[serde(rename = "fromString")]
    pub from_name: Option<String>,
    #[serde(rename = "toString")]
    pub to_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChangelogHistory {
    pub created: String,
    #[serde(default)]
    pub items: Vec<ChangelogItem>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Changelog {
    #[serde(default)]
    pub histories: Vec<ChangelogHistory>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct JiraIssue {
    pub key: String,
    pub fields: JiraIssueFields,
    #[serde(default)]
    pub changelog: Changelog,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct JiraSprint {
    pub id: i64,
    pub name: String,
    pub goal: Option<String>,
    pub state: String,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    #[serde(rename = "completeDate")]
    pub complete_date: Option<String>,
    #[serde(rename = "self")]
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct IssueListResponse {
    #[serde(rename = "startAt")]
    pub start_at: u64,
    #[serde(rename = "maxResults")]
    pub max_results: u64,
    pub total: u64,
    pub issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
pub struct SprintListResponse {
    #[serde(rename = "startAt")]
    pub start_at: u64,
    #[serde(rename = "maxResults")]
    pub max_results: u64,
    #[serde(rename = "isLast")]
    pub is_last: bool,
    pub values: Vec<JiraSprint>,
}

// Records written out for persistence and the dashboard

/// One measurable unit of work.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssueRecord {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub name: String,
    pub status: Status,
    pub story_points: Option<f64>,
    pub started: bool,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<String>,
    pub days_taken: Option<i64>,
    pub description: String,
    pub bau: bool,
    pub bau_breakdown: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SprintIssueRecord {
    #[serde(flatten)]
    pub issue: IssueRecord,
    pub planned: bool,
    pub started_in_sprint: bool,
    pub finished_in_sprint: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SprintDocument {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    pub goal: String,
    pub state: String,
    pub start: String,
    pub end: String,
    pub issues: Vec<SprintIssueRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SprintAuxiliaryData {
    pub goal_completed: bool,
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Team {
    pub name: String,
    pub board_id: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub planned: String,
    pub issues_count: u32,
    pub delivered_issues_count: u32,
    pub bau_issues_count: u32,
    pub delivered_issues_percentage: f64,
    pub bau_issues_percentage: f64,
    pub roadmap_issues_count: u32,
    pub roadmap_delivered_issues_count: u32,
    pub roadmap_delivered_issues_percentage: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SprintReportRow {
    #[serde(flatten)]
    pub summary: SummaryRow,
    pub start_date: String,
    pub end_date: String,
    pub goal_completed: u8,
    #[serde(rename = "_id")]
    pub id: i64,
    pub team_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BauSummary {
    #[serde(rename = "_id")]
    pub id: i64,
    pub team_name: String,
    pub start_date: String,
    pub end_date: String,
    pub bau_summary: Vec<String>,
}
