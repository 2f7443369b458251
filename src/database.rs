use crate::models::*;
use rusqlite::types::Value;
use rusqlite::OptionalExtension;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create storage directory: {0}")]
    StorageCreation(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(String),
    #[error("Stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_rusqlite::Error> for DatabaseError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        DatabaseError::Sqlite(err.to_string())
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::Sqlite(err.to_string())
    }
}

/// A sprint document together with the team it was collected for.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSprint {
    pub team_name: String,
    pub document: SprintDocument,
}

struct SprintRow {
    team_name: String,
    id: i64,
    name: String,
    goal: String,
    state: String,
    start: String,
    end: String,
    issues: String,
    auxiliary: SprintAuxiliaryData,
}

impl SprintRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(SprintRow {
            team_name: row.get("team_name")?,
            id: row.get("id")?,
            name: row.get("name")?,
            goal: row.get("goal")?,
            state: row.get("state")?,
            start: row.get("start_date")?,
            end: row.get("end_date")?,
            issues: row.get("issues")?,
            auxiliary: SprintAuxiliaryData {
                goal_completed: row.get::<_, Option<bool>>("goal_completed")?.unwrap_or(false),
                notes: row.get("notes")?,
            },
        })
    }

    fn into_stored(self) -> Result<(StoredSprint, SprintAuxiliaryData), DatabaseError> {
        let document = SprintDocument {
            id: self.id,
            name: self.name,
            goal: self.goal,
            state: self.state,
            start: self.start,
            end: self.end,
            issues: serde_json::from_str(&self.issues)?,
        };
        Ok((
            StoredSprint {
                team_name: self.team_name,
                document,
            },
            self.auxiliary,
        ))
    }
}

const SPRINT_COLUMNS: &str = "
    s.team_name, s.id, s.name, s.goal, s.state, s.start_date, s.end_date, s.issues,
    a.goal_completed, a.notes
    FROM sprints s
    LEFT JOIN sprint_auxiliary a ON a.sprint_id = s.id";

pub struct Database {
    connection: tokio_rusqlite::Connection,
}

impl Database {
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let connection = tokio_rusqlite::Connection::open(path).await?;
        Self::with_connection(connection).await
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let connection = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::with_connection(connection).await
    }

    async fn with_connection(connection: tokio_rusqlite::Connection) -> Result<Self, DatabaseError> {
        let db = Database { connection };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let init = "
            CREATE TABLE IF NOT EXISTS teams (
                name TEXT NOT NULL PRIMARY KEY,
                board_id INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sprints (
                id INTEGER NOT NULL PRIMARY KEY,
                team_name TEXT NOT NULL,
                name TEXT NOT NULL,
                goal TEXT NOT NULL,
                state TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                issues TEXT NOT NULL,
                FOREIGN KEY (team_name) REFERENCES teams(name)
            );
            CREATE TABLE IF NOT EXISTS sprint_auxiliary (
                sprint_id INTEGER NOT NULL PRIMARY KEY,
                goal_completed INTEGER NOT NULL DEFAULT 0,
                notes TEXT
            );
            CREATE TABLE IF NOT EXISTS historic_issues (
                name TEXT NOT NULL PRIMARY KEY,
                team_name TEXT NOT NULL,
                record TEXT NOT NULL,
                FOREIGN KEY (team_name) REFERENCES teams(name)
            );
            CREATE INDEX IF NOT EXISTS sprints_by_team ON sprints (team_name, start_date);";

        self.connection
            .call(move |conn| conn.execute_batch(init).map_err(tokio_rusqlite::Error::Rusqlite))
            .await?;
        Ok(())
    }

    pub async fn upsert_team(&self, team: &Team) -> Result<(), DatabaseError> {
        let query = "
            INSERT INTO teams (name, board_id)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET
                board_id = excluded.board_id
        ";
        let name = team.name.clone();
        let board_id = team.board_id as i64;

        self.connection
            .call(move |conn| {
                conn.execute(query, (name.as_str(), board_id))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    pub async fn get_teams(&self) -> Result<Vec<Team>, DatabaseError> {
        let query = "SELECT name, board_id FROM teams ORDER BY name";

        let teams = self
            .connection
            .call(move |conn| {
                let mut stmt = conn
                    .prepare_cached(query)
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([], |row| {
                        Ok(Team {
                            name: row.get("name")?,
                            board_id: row.get::<_, i64>("board_id")? as u64,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(teams)
    }

    async fn team_exists(&self, team_name: &str) -> Result<bool, DatabaseError> {
        let query = "SELECT COUNT(*) FROM teams WHERE name = ?";
        let team_name = team_name.to_string();

        let count = self
            .connection
            .call(move |conn| {
                conn.query_row(query, [team_name.as_str()], |row| row.get::<_, i64>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(count > 0)
    }

    /// Insert or replace the sprint. Returns `false` without writing when the
    /// team is unknown.
    pub async fn add_sprint(&self, team_name: &str, sprint: &SprintDocument) -> Result<bool, DatabaseError> {
        if !self.team_exists(team_name).await? {
            tracing::error!(team = team_name, sprint = sprint.id, "team not found, sprint not stored");
            return Ok(false);
        }

        let query = "
            INSERT INTO sprints (id, team_name, name, goal, state, start_date, end_date, issues)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                team_name = excluded.team_name,
                name = excluded.name,
                goal = excluded.goal,
                state = excluded.state,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                issues = excluded.issues
        ";
        let issues = serde_json::to_string(&sprint.issues)?;
        let team_name = team_name.to_string();
        let sprint = sprint.clone();

        self.connection
            .call(move |conn| {
                conn.execute(
                    query,
                    (
                        sprint.id,
                        team_name.as_str(),
                        sprint.name.as_str(),
                        sprint.goal.as_str(),
                        sprint.state.as_str(),
                        sprint.start.as_str(),
                        sprint.end.as_str(),
                        issues.as_str(),
                    ),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(true)
    }

    async fn query_sprints(
        &self,
        query: String,
        params: Vec<Value>,
    ) -> Result<Vec<(StoredSprint, SprintAuxiliaryData)>, DatabaseError> {
        let rows = self
            .connection
            .call(move |conn| {
                let mut stmt = conn
                    .prepare_cached(&query)
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), SprintRow::from_row)
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;

        rows.into_iter().map(SprintRow::into_stored).collect()
    }

    pub async fn get_sprint(&self, sprint_id: i64) -> Result<Option<StoredSprint>, DatabaseError> {
        let sprints = self
            .query_sprints(
                format!("SELECT {} WHERE s.id = ?", SPRINT_COLUMNS),
                vec![Value::Integer(sprint_id)],
            )
            .await?;
        Ok(sprints.into_iter().next().map(|(sprint, _)| sprint))
    }

    /// Sprints of `team_name`, most recent first. With `since`, only sprints
    /// starting at or after that `YYYY-MM-DDTHH:MM:SS` timestamp.
    pub async fn get_sprints_with_auxiliary(
        &self,
        team_name: &str,
        since: Option<&str>,
    ) -> Result<Vec<(SprintDocument, SprintAuxiliaryData)>, DatabaseError> {
        let mut params = vec![Value::Text(team_name.to_string())];
        let mut query = format!("SELECT {} WHERE s.team_name = ?", SPRINT_COLUMNS);
        if let Some(since) = since {
            query.push_str(" AND s.start_date >= ?");
            params.push(Value::Text(since.to_string()));
        }
        query.push_str(" ORDER BY s.start_date DESC");

        let sprints = self.query_sprints(query, params).await?;
        Ok(sprints
            .into_iter()
            .map(|(sprint, auxiliary)| (sprint.document, auxiliary))
            .collect())
    }

    pub async fn get_sprints(
        &self,
        team_name: &str,
        since: Option<&str>,
    ) -> Result<Vec<SprintDocument>, DatabaseError> {
        let sprints = self.get_sprints_with_auxiliary(team_name, since).await?;
        Ok(sprints.into_iter().map(|(sprint, _)| sprint).collect())
    }

    pub async fn get_latest_sprint(&self, team_name: &str) -> Result<Option<SprintDocument>, DatabaseError> {
        Ok(self.get_sprints(team_name, None).await?.into_iter().next())
    }

    /// Defaults when nothing has been recorded for the sprint yet.
    pub async fn get_sprint_auxiliary_data(&self, sprint_id: i64) -> Result<SprintAuxiliaryData, DatabaseError> {
        let query = "SELECT goal_completed, notes FROM sprint_auxiliary WHERE sprint_id = ?";

        let auxiliary = self
            .connection
            .call(move |conn| {
                conn.query_row(query, [sprint_id], |row| {
                    Ok(SprintAuxiliaryData {
                        goal_completed: row.get("goal_completed")?,
                        notes: row.get("notes")?,
                    })
                })
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(auxiliary.unwrap_or_default())
    }

    pub async fn update_sprint_auxiliary_data(
        &self,
        sprint_id: i64,
        auxiliary: &SprintAuxiliaryData,
    ) -> Result<(), DatabaseError> {
        let query = "
            INSERT INTO sprint_auxiliary (sprint_id, goal_completed, notes)
            VALUES (?, ?, ?)
            ON CONFLICT(sprint_id) DO UPDATE SET
                goal_completed = excluded.goal_completed,
                notes = excluded.notes
        ";
        let auxiliary = auxiliary.clone();

        self.connection
            .call(move |conn| {
                conn.execute(query, (sprint_id, auxiliary.goal_completed, auxiliary.notes.as_deref()))
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        Ok(())
    }

    /// Insert or replace finished issues by name. Skipped entirely when the
    /// team is unknown.
    pub async fn upsert_historic_issues(
        &self,
        team_name: &str,
        records: &[IssueRecord],
    ) -> Result<usize, DatabaseError> {
        if !self.team_exists(team_name).await? {
            tracing::error!(team = team_name, "team not found, historic issues not stored");
            return Ok(0);
        }

        let query = "
            INSERT INTO historic_issues (name, team_name, record)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                team_name = excluded.team_name,
                record = excluded.record
        ";
        let team_name = team_name.to_string();
        let rows = records
            .iter()
            .map(|record| serde_json::to_string(record).map(|json| (record.name.clone(), json)))
            .collect::<Result<Vec<_>, _>>()?;

        let written = self
            .connection
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                {
                    let mut stmt = tx
                        .prepare_cached(query)
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for (name, record) in &rows {
                        stmt.execute((name.as_str(), team_name.as_str(), record.as_str()))
                            .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(rows.len())
            })
            .await?;
        Ok(written)
    }

    pub async fn get_historic_issues(&self, team_name: &str) -> Result<Vec<IssueRecord>, DatabaseError> {
        let query = "SELECT record FROM historic_issues WHERE team_name = ? ORDER BY name";
        let team_name = team_name.to_string();

        let records = self
            .connection
            .call(move |conn| {
                let mut stmt = conn
                    .prepare_cached(query)
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([team_name.as_str()], |row| row.get::<_, String>("record"))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;

        Ok(records
            .iter()
            .map(|record| serde_json::from_str(record))
            .collect::<Result<Vec<_>, _>>()?)
    }
}
