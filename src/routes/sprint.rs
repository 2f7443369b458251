use super::{escape, page, svg_response, AppError, AppState};
use crate::charts::render_sprint_summary;
use crate::database::StoredSprint;
use crate::models::SprintAuxiliaryData;
use crate::report;
use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct GoalForm {
    /// Present (as `on`) only when the checkbox is ticked.
    goal_completed: Option<String>,
}

#[derive(Deserialize)]
pub struct NotesForm {
    notes: String,
}

async fn stored_sprint(state: &AppState, sprint_id: i64) -> Result<StoredSprint, AppError> {
    state
        .database
        .get_sprint(sprint_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("sprint {}", sprint_id)))
}

pub async fn sprint_page(
    State(state): State<AppState>,
    Path(sprint_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let StoredSprint { team_name, document } = stored_sprint(&state, sprint_id).await?;
    let auxiliary = state.database.get_sprint_auxiliary_data(sprint_id).await?;

    let summary = report::summarise(&document.issues)
        .iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td><td>{}%</td><td>{}</td><td>{}</td><td>{}%</td></tr>",
                row.planned,
                row.issues_count,
                row.delivered_issues_count,
                row.delivered_issues_percentage,
                row.bau_issues_count,
                row.bau_issues_percentage,
                row.roadmap_issues_count,
                row.roadmap_delivered_issues_count,
                row.roadmap_delivered_issues_percentage,
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let yes_no = |value: bool| if value { "yes" } else { "no" };
    let issues = document
        .issues
        .iter()
        .map(|record| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&record.issue.name),
                record.issue.issue_type,
                record.issue.status,
                escape(&record.issue.description),
                record.issue.story_points.map(|p| p.to_string()).unwrap_or_default(),
                record.issue.days_taken.map(|d| d.to_string()).unwrap_or_default(),
                yes_no(record.planned),
                yes_no(record.finished_in_sprint),
                yes_no(record.issue.bau),
                escape(&record.issue.bau_breakdown.join(", ")),
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let checked = if auxiliary.goal_completed { " checked" } else { "" };
    let notes = escape(auxiliary.notes.as_deref().unwrap_or_default());

    Ok(Html(page(
        &format!("{} / {}", team_name, document.name),
        &format!(
            r#"
            <p><a href="/team/{team}">Back to {team}</a></p>
            <p>{start} to {end}, {state}</p>
            <p>Goal: {goal}</p>
            <form method="post" action="/sprint/{id}/goal">
                <label><input type="checkbox" name="goal_completed"{checked}> Goal completed</label>
                <button type="submit">Save</button>
            </form>
            <h2>Summary</h2>
            <img src="/sprint/{id}/summary.svg" alt="summary">
            <table>
                <tr><th></th><th>Issues</th><th>Delivered</th><th>Delivered %</th><th>BAU</th><th>BAU %</th><th>Roadmap</th><th>Roadmap delivered</th><th>Roadmap delivered %</th></tr>
                {summary}
            </table>
            <h2>Issues</h2>
            <table>
                <tr><th>Issue</th><th>Type</th><th>Status</th><th>Description</th><th>Points</th><th>Days</th><th>Planned</th><th>Delivered</th><th>BAU</th><th>Breakdown</th></tr>
                {issues}
            </table>
            <h2>Notes</h2>
            <form method="post" action="/sprint/{id}/notes">
                <textarea name="notes" rows="6" cols="80">{notes}</textarea>
                <button type="submit">Save</button>
            </form>
            "#,
            team = escape(&team_name),
            start = document.start,
            end = document.end,
            state = escape(&document.state),
            goal = escape(&document.goal),
            id = document.id,
        ),
    )))
}

pub async fn summary_svg(
    State(state): State<AppState>,
    Path(sprint_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let StoredSprint { document, .. } = stored_sprint(&state, sprint_id).await?;
    Ok(svg_response(render_sprint_summary(&report::summarise(&document.issues))))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Path(sprint_id): Path<i64>,
    Form(form): Form<GoalForm>,
) -> Result<Redirect, AppError> {
    stored_sprint(&state, sprint_id).await?;
    let current = state.database.get_sprint_auxiliary_data(sprint_id).await?;
    let auxiliary = SprintAuxiliaryData {
        goal_completed: form.goal_completed.is_some(),
        ..current
    };
    state.database.update_sprint_auxiliary_data(sprint_id, &auxiliary).await?;
    tracing::info!(sprint = sprint_id, goal_completed = auxiliary.goal_completed, "updated sprint goal");
    Ok(Redirect::to(&format!("/sprint/{}", sprint_id)))
}

pub async fn update_notes(
    State(state): State<AppState>,
    Path(sprint_id): Path<i64>,
    Form(form): Form<NotesForm>,
) -> Result<Redirect, AppError> {
    stored_sprint(&state, sprint_id).await?;
    let current = state.database.get_sprint_auxiliary_data(sprint_id).await?;
    let notes = form.notes.trim();
    let auxiliary = SprintAuxiliaryData {
        notes: (!notes.is_empty()).then(|| notes.to_string()),
        ..current
    };
    state.database.update_sprint_auxiliary_data(sprint_id, &auxiliary).await?;
    tracing::info!(sprint = sprint_id, "updated sprint notes");
    Ok(Redirect::to(&format!("/sprint/{}", sprint_id)))
}
