pub mod root;
pub mod sprint;
pub mod team;

use crate::config::Config;
use crate::database::{Database, DatabaseError};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
    pub config: Arc<Config>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error while serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Html(page("Error", &format!("<p>{}</p>", escape(&self.to_string()))))).into_response()
    }
}

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(root::root))
        .route("/team/{team}", get(team::team_page))
        .route("/team/{team}/trend.svg", get(team::trend_svg))
        .route("/team/{team}/bau.svg", get(team::bau_svg))
        .route("/sprint/{sprint_id}", get(sprint::sprint_page))
        .route("/sprint/{sprint_id}/summary.svg", get(sprint::summary_svg))
        .route("/sprint/{sprint_id}/goal", post(sprint::update_goal))
        .route("/sprint/{sprint_id}/notes", post(sprint::update_notes))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .with_state(state)
}

pub(crate) fn svg_response(svg_content: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg_content)
}

pub(crate) fn page(title: &str, body: &str) -> String {
    format!(
        r#"
        <!DOCTYPE html>
        <html>
            <head>
                <title>{title}</title>
                <link rel="stylesheet" href="/static/style.css">
            </head>
            <body>
                <nav><a href="/">Teams</a></nav>
                <h1>{title}</h1>
                {body}
            </body>
        </html>
        "#,
        title = escape(title),
        body = body
    )
}

pub(crate) fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::JiraConfig;
    use crate::jira_types::{IssueType, Status};
    use crate::metrics::DurationPolicy;
    use crate::models::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub(crate) fn record(name: &str, planned: bool, finished_in_sprint: bool, bau: bool) -> SprintIssueRecord {
        SprintIssueRecord {
            issue: IssueRecord {
                issue_type: IssueType::Story,
                name: name.to_string(),
                status: if finished_in_sprint { Status::Done } else { Status::InProgress },
                story_points: Some(2.0),
                started: true,
                finished: finished_in_sprint,
                start_time: Some("2020-01-02T09:00:00".to_string()),
                end_time: finished_in_sprint.then(|| "2020-01-03T09:00:00".to_string()),
                days_taken: finished_in_sprint.then_some(1),
                description: "Payments <v2>".to_string(),
                bau,
                bau_breakdown: if bau { vec!["support".to_string()] } else { vec![] },
            },
            planned,
            started_in_sprint: true,
            finished_in_sprint,
        }
    }

    pub(crate) async fn test_state() -> AppState {
        let database = Database::open_in_memory().await.unwrap();
        let team = Team {
            name: "cx".to_string(),
            board_id: 130,
        };
        database.upsert_team(&team).await.unwrap();
        database
            .add_sprint(
                "cx",
                &SprintDocument {
                    id: 1,
                    name: "Usain".to_string(),
                    goal: "Achieve Something".to_string(),
                    state: "closed".to_string(),
                    start: "2020-01-01T09:00:00".to_string(),
                    end: "2020-01-14T09:00:00".to_string(),
                    issues: vec![
                        record("CX-1", true, true, false),
                        record("CX-2", false, true, true),
                        record("CX-3", true, false, false),
                    ],
                },
            )
            .await
            .unwrap();

        AppState {
            database: Arc::new(database),
            config: Arc::new(Config {
                jira: JiraConfig {
                    base_url: "https://example.atlassian.net".to_string(),
                    email: "someone@example.com".to_string(),
                    token: "secret".to_string(),
                    story_points_field: "customfield_11638".to_string(),
                },
                database_path: ":memory:".to_string(),
                teams: vec![team],
                sprints_past: 3,
                duration_policy: DurationPolicy::Indeterminate,
                bind_addr: "127.0.0.1:0".to_string(),
            }),
        }
    }

    pub(crate) async fn get(app: axum::Router, uri: &str) -> (StatusCode, String, Option<String>) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(resp).await
    }

    pub(crate) async fn post_form(app: axum::Router, uri: &str, form: &str) -> (StatusCode, String, Option<String>) {
        let resp = app
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(resp).await
    }

    async fn read(resp: Response) -> (StatusCode, String, Option<String>) {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<b>\"R&D\"</b>"), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
    }

    #[tokio::test]
    async fn unknown_sprint_is_not_found() {
        let (status, body, _) = get(router(test_state().await), "/sprint/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("sprint 99 not found"));
    }
}
