use crate::metrics::DurationPolicy;
use crate::models::Team;
use std::env;
use thiserror::Error;

pub const DEFAULT_STORY_POINTS_FIELD: &str = "customfield_11638";
pub const DEFAULT_DATABASE_PATH: &str = "storage/sprint_metrics.db";
pub const DEFAULT_TEAMS: &str = "cx:130,dar:145,voyager:140";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JiraConfig {
    /// e.g. `https://example.atlassian.net`
    pub base_url: String,
    pub email: String,
    pub token: String,
    pub story_points_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub jira: JiraConfig,
    pub database_path: String,
    pub teams: Vec<Team>,
    pub sprints_past: usize,
    pub duration_policy: DurationPolicy,
    pub bind_addr: String,
}

impl Config {
    /// Read the configuration from the environment, loading `.env` first if
    /// there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let sprints_past = or_default("SPRINTS_PAST", "3")
            .parse::<usize>()
            .map_err(|e| ConfigError::Invalid {
                key: "SPRINTS_PAST",
                message: e.to_string(),
            })?;
        let duration_policy = or_default("DURATION_POLICY", "indeterminate")
            .parse::<DurationPolicy>()
            .map_err(|message| ConfigError::Invalid {
                key: "DURATION_POLICY",
                message,
            })?;

        Ok(Self {
            jira: JiraConfig {
                base_url: required("JIRA_BASE_URL")?.trim_end_matches('/').to_string(),
                email: required("JIRA_EMAIL")?,
                token: required("JIRA_TOKEN")?,
                story_points_field: or_default("JIRA_STORY_POINTS_FIELD", DEFAULT_STORY_POINTS_FIELD),
            },
            database_path: or_default("DATABASE_PATH", DEFAULT_DATABASE_PATH),
            teams: parse_teams(&or_default("TEAMS", DEFAULT_TEAMS))?,
            sprints_past,
            duration_policy,
            bind_addr: or_default("BIND_ADDR", "0.0.0.0:8080"),
        })
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.name == name)
    }
}

/// Parse `name:board_id` pairs separated by commas.
pub fn parse_teams(value: &str) -> Result<Vec<Team>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let invalid = |message: String| ConfigError::Invalid {
                key: "TEAMS",
                message,
            };
            let (name, board_id) = entry
                .split_once(':')
                .ok_or_else(|| invalid(format!("expected name:board_id, got {entry:?}")))?;
            let board_id = board_id
                .trim()
                .parse::<u64>()
                .map_err(|e| invalid(format!("board id for {name}: {e}")))?;
            Ok(Team {
                name: name.trim().to_string(),
                board_id,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("JIRA_BASE_URL", "https://example.atlassian.net/"),
        ("JIRA_EMAIL", "someone@example.com"),
        ("JIRA_TOKEN", "secret"),
    ];

    #[test]
    fn defaults_fill_optional_values() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.jira.base_url, "https://example.atlassian.net");
        assert_eq!(config.jira.story_points_field, DEFAULT_STORY_POINTS_FIELD);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.sprints_past, 3);
        assert_eq!(config.duration_policy, DurationPolicy::Indeterminate);
        assert_eq!(config.teams.len(), 3);
        assert_eq!(config.team("dar").map(|t| t.board_id), Some(145));
    }

    #[test]
    fn missing_credentials_fail() {
        let result = Config::from_lookup(lookup(&REQUIRED[..2]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("JIRA_TOKEN"));
    }

    #[test]
    fn overrides_are_honoured() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("TEAMS", "platform:12, infra:13"),
            ("SPRINTS_PAST", "6"),
            ("DURATION_POLICY", "one_day"),
            ("JIRA_STORY_POINTS_FIELD", "customfield_10002"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.teams,
            vec![
                Team { name: "platform".to_string(), board_id: 12 },
                Team { name: "infra".to_string(), board_id: 13 },
            ]
        );
        assert_eq!(config.sprints_past, 6);
        assert_eq!(config.duration_policy, DurationPolicy::OneDay);
        assert_eq!(config.jira.story_points_field, "customfield_10002");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TEAMS", "cx"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "TEAMS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DURATION_POLICY", "whenever"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "DURATION_POLICY", .. })
        ));
    }
}
