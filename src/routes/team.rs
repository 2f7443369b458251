use super::{escape, page, svg_response, AppError, AppState};
use crate::charts::{render_bau_breakdown, render_team_trend};
use crate::forecast::Forecast;
use crate::models::{BauSummary, SprintReportRow};
use crate::report;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use itertools::Itertools;

async fn team_reports(
    state: &AppState,
    team_name: &str,
) -> Result<(Vec<SprintReportRow>, Vec<BauSummary>), AppError> {
    let known = state.config.team(team_name).is_some()
        || state.database.get_teams().await?.iter().any(|team| team.name == team_name);
    if !known {
        return Err(AppError::NotFound(format!("team {}", team_name)));
    }

    let sprints = state.database.get_sprints_with_auxiliary(team_name, None).await?;
    let reports = sprints
        .iter()
        .map(|(sprint, auxiliary)| report::sprint_report(team_name, sprint, auxiliary))
        .collect();
    let bau = sprints
        .iter()
        .map(|(sprint, _)| report::bau_summary(team_name, sprint))
        .collect();
    Ok((reports, bau))
}

pub async fn team_page(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<Html<String>, AppError> {
    let (reports, _) = team_reports(&state, &team_name).await?;

    let rows = reports
        .iter()
        .map(|row| {
            format!(
                r#"<tr><td><a href="/sprint/{id}">{id}</a></td><td>{start}</td><td>{end}</td><td>{issues}</td><td>{delivered}%</td><td>{bau}%</td><td>{roadmap}%</td><td>{goal}</td></tr>"#,
                id = row.id,
                start = row.start_date,
                end = row.end_date,
                issues = row.summary.issues_count,
                delivered = row.summary.delivered_issues_percentage,
                bau = row.summary.bau_issues_percentage,
                roadmap = row.summary.roadmap_delivered_issues_percentage,
                goal = if row.goal_completed == 100 { "yes" } else { "no" },
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let forecast = Forecast::new(state.database.get_historic_issues(&team_name).await?);
    let forecast_html = if forecast.is_empty() {
        "<p>No completed issues collected yet.</p>".to_string()
    } else {
        let quantiles = [50, 85, 95]
            .iter()
            .filter_map(|percent| {
                let days = forecast.quantile(f64::from(*percent) / 100.0)?;
                Some(format!("<li>{}% within {:.1} days</li>", percent, days))
            })
            .collect::<Vec<_>>()
            .join("");
        let by_points = forecast
            .story_point_pairs()
            .into_iter()
            .into_group_map_by(|(points, _)| points.to_string())
            .into_iter()
            .sorted_by(|a, b| a.1[0].0.total_cmp(&b.1[0].0))
            .map(|(points, pairs)| {
                let mean = pairs.iter().map(|(_, days)| *days as f64).sum::<f64>() / pairs.len() as f64;
                format!("<tr><td>{}</td><td>{}</td><td>{:.1}</td></tr>", points, pairs.len(), mean)
            })
            .collect::<Vec<_>>()
            .join("");
        format!(
            "<p>Cycle time over {} completed issues</p><ul>{}</ul><table><tr><th>Points</th><th>Issues</th><th>Mean days</th></tr>{}</table>",
            forecast.len(),
            quantiles,
            by_points
        )
    };

    let name = escape(&team_name);
    Ok(Html(page(
        &format!("Team {}", team_name),
        &format!(
            r#"
            <h2>Delivered and BAU share</h2>
            <img src="/team/{name}/trend.svg" alt="trend">
            <h2>BAU breakdown</h2>
            <img src="/team/{name}/bau.svg" alt="BAU breakdown">
            <h2>Sprints</h2>
            <table>
                <tr><th>Sprint</th><th>Start</th><th>End</th><th>Issues</th><th>Delivered</th><th>BAU</th><th>Roadmap delivered</th><th>Goal met</th></tr>
                {rows}
            </table>
            <h2>Forecast</h2>
            {forecast_html}
            "#,
        ),
    )))
}

pub async fn trend_svg(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (reports, _) = team_reports(&state, &team_name).await?;
    Ok(svg_response(render_team_trend(&reports)))
}

pub async fn bau_svg(
    State(state): State<AppState>,
    Path(team_name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (_, bau) = team_reports(&state, &team_name).await?;
    let counts = report::bau_breakdown_counts(bau.iter().take(state.config.sprints_past.max(1)));
    Ok(svg_response(render_bau_breakdown(&counts)))
}

#[cfg(test)]
mod tests {
    use crate::routes::router;
    use crate::routes::tests::{get, record, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn team_page_lists_sprint_reports() {
        let (status, body, _) = get(router(test_state().await), "/team/cx").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/sprint/1">1</a>"#));
        assert!(body.contains("<td>67%</td><td>33%</td><td>50%</td><td>no</td>"));
        assert!(body.contains("No completed issues collected yet."));
    }

    #[tokio::test]
    async fn forecast_groups_cycle_time_by_story_points() {
        let state = test_state().await;
        let historic: Vec<_> = [("CX-10", 2.0, 1), ("CX-11", 2.0, 2), ("CX-12", 5.0, 3), ("CX-13", 8.0, 10)]
            .into_iter()
            .map(|(name, points, days)| {
                let mut record = record(name, true, true, false).issue;
                record.story_points = Some(points);
                record.days_taken = Some(days);
                record
            })
            .collect();
        state.database.upsert_historic_issues("cx", &historic).await.unwrap();

        let (_, body, _) = get(router(state), "/team/cx").await;
        assert!(body.contains("Cycle time over 3 completed issues"));
        assert!(body.contains("<tr><td>2</td><td>2</td><td>1.5</td></tr><tr><td>5</td><td>1</td><td>3.0</td></tr>"));
    }

    #[tokio::test]
    async fn unknown_team_is_not_found() {
        let (status, _, _) = get(router(test_state().await), "/team/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn charts_are_served_as_svg() {
        let state = test_state().await;
        let (status, body, content_type) = get(router(state.clone()), "/team/cx/trend.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/svg+xml"));
        assert!(body.contains("2020-01-01"));

        let (status, body, _) = get(router(state), "/team/cx/bau.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("support"));
    }
}
