//! Closed sets of issue statuses and issue types.
//!
//! Jira boards use free-text names for both, and every team names its
//! columns a little differently. Names are folded into a canonical key first
//! and only then looked up, so "In Progress", "in-progress" and "INPROGRESS"
//! all land on the same variant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase the name, drop spaces and hyphens, then apply the synonym table
/// and the substring rules.
pub fn canonicalize_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    let mapped = match folded.as_str() {
        "underreview" => Some("codereview"),
        "refactor" => Some("techdebt"),
        _ => None,
    };
    if let Some(mapped) = mapped {
        return mapped.to_string();
    }

    // Substring rules are applied in order; a later match wins.
    let mut canonical = folded;
    if canonical.contains("qa") || canonical.contains("inmaster") {
        canonical = "qa".to_string();
    }
    if canonical.contains("techdebt") {
        canonical = "techdebt".to_string();
    }
    if canonical.contains("done") {
        canonical = "done".to_string();
    }
    canonical
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    InProgress,
    Done,
    CodeReview,
    Blocked,
    Qa,
}

impl Status {
    /// Look up a Jira status name. Unknown names yield `None` and are logged.
    pub fn from_jira_name(name: &str) -> Option<Self> {
        let status = match canonicalize_name(name).as_str() {
            "todo" => Status::Todo,
            "inprogress" => Status::InProgress,
            "done" => Status::Done,
            "codereview" => Status::CodeReview,
            "blocked" => Status::Blocked,
            "qa" => Status::Qa,
            _ => {
                tracing::warn!(status = %name, "rejected status value");
                return None;
            }
        };
        Some(status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "inprogress",
            Status::Done => "done",
            Status::CodeReview => "codereview",
            Status::Blocked => "blocked",
            Status::Qa => "qa",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Epic,
    Bug,
    Story,
    Task,
    Subtask,
    Spike,
    UserStory,
    Adhoc,
    Documentation,
    TechDebt,
    Feature,
}

impl IssueType {
    pub fn from_jira_name(name: &str) -> Option<Self> {
        let issue_type = match canonicalize_name(name).as_str() {
            "epic" => IssueType::Epic,
            "bug" => IssueType::Bug,
            "story" => IssueType::Story,
            "task" => IssueType::Task,
            "subtask" => IssueType::Subtask,
            "spike" => IssueType::Spike,
            "userstory" => IssueType::UserStory,
            "adhoc" => IssueType::Adhoc,
            "documentation" => IssueType::Documentation,
            "techdebt" => IssueType::TechDebt,
            "feature" => IssueType::Feature,
            _ => {
                tracing::warn!(issue_type = %name, "rejected issue type");
                return None;
            }
        };
        Some(issue_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Epic => "epic",
            IssueType::Bug => "bug",
            IssueType::Story => "story",
            IssueType::Task => "task",
            IssueType::Subtask => "subtask",
            IssueType::Spike => "spike",
            IssueType::UserStory => "userstory",
            IssueType::Adhoc => "adhoc",
            IssueType::Documentation => "documentation",
            IssueType::TechDebt => "techdebt",
            IssueType::Feature => "feature",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
