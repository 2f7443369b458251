use crate::models::{SprintReportRow, SummaryRow};
use crate::renderer::{scale, Bar, BarGroup, GraphStyle, Point, Renderer};

const ISSUES_COLOR: &str = "#4A90E2";
const DELIVERED_COLOR: &str = "#2ECC71";
const BAU_COLOR: &str = "#F5A623";

/// Issues, delivered and BAU counts for each summary row.
pub fn render_sprint_summary(rows: &[SummaryRow]) -> String {
    let renderer = Renderer::new(360, 160, 24);
    let max_value = rows.iter().map(|row| row.issues_count).max().unwrap_or(0);

    let groups: Vec<BarGroup> = rows
        .iter()
        .map(|row| BarGroup {
            label: row.planned.clone(),
            bars: vec![
                Bar { value: f64::from(row.issues_count), color: ISSUES_COLOR },
                Bar { value: f64::from(row.delivered_issues_count), color: DELIVERED_COLOR },
                Bar { value: f64::from(row.bau_issues_count), color: BAU_COLOR },
            ],
        })
        .collect();

    renderer.render_bar_groups(&groups, f64::from(max_value))
}

/// Delivered and BAU percentages across sprints. `reports` come most recent
/// first, the graph runs oldest to newest.
pub fn render_team_trend(reports: &[SprintReportRow]) -> String {
    let renderer = Renderer::new(480, 160, 24);
    let chronological: Vec<&SprintReportRow> = reports.iter().rev().collect();

    let x_step = if chronological.len() > 1 {
        renderer.width as f64 / (chronological.len() - 1) as f64
    } else {
        0.0
    };
    let series = |percentage: fn(&SprintReportRow) -> f64| -> Vec<Point> {
        chronological
            .iter()
            .enumerate()
            .map(|(i, report)| Point {
                x: i as f64 * x_step,
                y: renderer.height as f64 - scale(percentage(report), 100.0, renderer.height as f64),
            })
            .collect()
    };

    let graphs = vec![
        (
            series(|report| report.summary.delivered_issues_percentage),
            GraphStyle { stroke_color: DELIVERED_COLOR, fill_color: DELIVERED_COLOR },
        ),
        (
            series(|report| report.summary.bau_issues_percentage),
            GraphStyle { stroke_color: BAU_COLOR, fill_color: BAU_COLOR },
        ),
    ];
    let labels: Vec<String> = chronological
        .iter()
        .map(|report| report.start_date.chars().take(10).collect())
        .collect();

    renderer.render_line_graphs(&graphs, &labels)
}

pub fn render_bau_breakdown(counts: &[(String, usize)]) -> String {
    let row_height = 24;
    let renderer = Renderer::new(360, (counts.len().max(1) as i32) * row_height, 12);
    let bars: Vec<(String, f64)> = counts
        .iter()
        .map(|(category, count)| (category.clone(), *count as f64))
        .collect();
    renderer.render_horizontal_bars(&bars, BAU_COLOR)
}
