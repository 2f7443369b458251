use super::{escape, page, AppError, AppState};
use crate::report;

/// Every team with the headline numbers of its latest stored sprint.
pub async fn root(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::response::Html<String>, AppError> {
    let teams = state.database.get_teams().await?;

    let mut rows = Vec::with_capacity(teams.len());
    for team in &teams {
        let latest = match state.database.get_latest_sprint(&team.name).await? {
            Some(sprint) => {
                let total = report::total_row(&sprint.issues);
                format!(
                    r#"<a href="/sprint/{}">{}</a> ({} issues, {}% delivered, {}% BAU)"#,
                    sprint.id,
                    escape(&sprint.name),
                    total.issues_count,
                    total.delivered_issues_percentage,
                    total.bau_issues_percentage
                )
            }
            None => "No sprints collected yet".to_string(),
        };
        rows.push(format!(
            r#"<tr><td><a href="/team/{name}">{name}</a></td><td>{board}</td><td>{latest}</td></tr>"#,
            name = escape(&team.name),
            board = team.board_id,
            latest = latest
        ));
    }

    Ok(axum::response::Html(page(
        "Teams",
        &format!(
            "<table><tr><th>Team</th><th>Board</th><th>Latest sprint</th></tr>{}</table>",
            rows.join("")
        ),
    )))
}

#[cfg(test)]
mod tests {
    use crate::routes::tests::{get, test_state};
    use crate::routes::router;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn lists_teams_with_latest_sprint() {
        let (status, body, _) = get(router(test_state().await), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/team/cx">cx</a>"#));
        assert!(body.contains(r#"<a href="/sprint/1">Usain</a>"#));
        assert!(body.contains("3 issues, 67% delivered, 33% BAU"));
    }
}
