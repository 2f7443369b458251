use crate::config::Config;
use crate::database::*;
use crate::issue::{BuildError, FetchError, IssueFetcher, IssueParser, IssueTree};
use crate::jira_client::*;
use crate::jira_types::Status;
use crate::models::*;
use crate::sprint::Sprint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error(transparent)]
    Jira(#[from] JiraClientError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Build a tree for every issue. Issues that cannot be parsed are logged and
/// left out; a subtask that cannot be fetched fails the whole batch.
pub fn build_trees(
    parser: &IssueParser,
    raw_issues: &[JiraIssue],
    fetcher: &dyn IssueFetcher,
) -> Result<Vec<IssueTree>, FetchError> {
    let mut trees = Vec::with_capacity(raw_issues.len());
    for raw in raw_issues {
        match parser.build_tree(raw, Some(fetcher)) {
            Ok(tree) => trees.push(tree),
            Err(BuildError::Parse(e)) => {
                tracing::warn!(issue = %raw.key, error = %e, "dropping issue");
            }
            Err(BuildError::Fetch(e)) => return Err(e),
        }
    }
    Ok(trees)
}

/// Flat records of the done, stand-alone, non-epic issues in `raw_issues`.
pub fn completed_issue_records(parser: &IssueParser, raw_issues: &[JiraIssue]) -> Vec<IssueRecord> {
    raw_issues
        .iter()
        .filter(|raw| raw.fields.subtasks.is_empty())
        .filter_map(|raw| match parser.build_tree(raw, None) {
            Ok(tree) => Some(tree),
            Err(e) => {
                tracing::warn!(issue = %raw.key, error = %e, "dropping issue");
                None
            }
        })
        .filter(|tree| tree.root().is_measurable() && tree.root().status == Status::Done)
        .flat_map(|tree| tree.to_flat_records())
        .collect()
}

/// Fetch, classify and store the `past` most recent closed sprints of `team`.
pub async fn collect_sprints(
    jira_client: &JiraClient,
    database: &Database,
    config: &Config,
    team: &Team,
    past: usize,
) -> Result<Vec<SprintDocument>, CollectError> {
    let parser = IssueParser::new(&config.jira.story_points_field, config.duration_policy);
    database.upsert_team(team).await?;

    let mut documents = Vec::new();
    for raw_sprint in jira_client.get_closed_sprints(team.board_id, past).await? {
        let sprint = match Sprint::from_jira(&raw_sprint) {
            Ok(sprint) => sprint,
            Err(e) => {
                tracing::warn!(sprint = raw_sprint.id, error = %e, "skipping sprint");
                continue;
            }
        };

        let raw_issues = jira_client.get_sprint_issues(team.board_id, sprint.id).await?;
        let subtasks = jira_client.prefetch_subtasks(&raw_issues).await?;
        let trees = build_trees(&parser, &raw_issues, &subtasks)?;
        let document = sprint.with_issues(trees).to_document();

        tracing::info!(
            team = %team.name,
            sprint = document.id,
            name = %document.name,
            issues = document.issues.len(),
            "collected sprint"
        );
        database.add_sprint(&team.name, &document).await?;
        documents.push(document);
    }

    Ok(documents)
}

/// Store every completed measurable issue on the team's board for forecasting.
pub async fn collect_historic_issues(
    jira_client: &JiraClient,
    database: &Database,
    config: &Config,
    team: &Team,
) -> Result<Vec<IssueRecord>, CollectError> {
    let parser = IssueParser::new(&config.jira.story_points_field, config.duration_policy);
    database.upsert_team(team).await?;

    let raw_issues = jira_client.get_board_issues(team.board_id).await?;
    let records = completed_issue_records(&parser, &raw_issues);
    let written = database.upsert_historic_issues(&team.name, &records).await?;
    tracing::info!(team = %team.name, fetched = raw_issues.len(), written, "collected historic issues");
    Ok(records)
}

/// Collect sprints for every configured team. A failing team is logged and
/// the rest still run.
pub async fn collect_data(jira_client: &JiraClient, database: &Database, config: &Config) {
    tracing::info!(teams = config.teams.len(), "collecting data");

    for team in &config.teams {
        if let Err(e) = collect_sprints(jira_client, database, config, team, config.sprints_past).await {
            tracing::error!(team = %team.name, error = %e, "collecting sprints failed");
        }
    }

    tracing::info!("data collected and stored");
}
