use svg::node::element::{path::Data, Line, Path, Rectangle, Text};
use svg::Document;

const FONT_SIZE: i32 = 10;
const AXIS_COLOR: &str = "#555555";

pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub struct GraphStyle {
    pub stroke_color: &'static str,
    pub fill_color: &'static str,
}

pub struct Bar {
    pub value: f64,
    pub color: &'static str,
}

/// Bars drawn side by side above one x-axis label.
pub struct BarGroup {
    pub label: String,
    pub bars: Vec<Bar>,
}

/// Draws into a `width` x `height` plot area surrounded by `margin` on every
/// side; the margin holds axis labels. Point coordinates are in plot pixels
/// with y growing downwards.
pub struct Renderer {
    pub width: i32,
    pub height: i32,
    margin: i32,
}

impl Renderer {
    pub fn new(width: i32, height: i32, margin: i32) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    fn document(&self) -> Document {
        Document::new()
            .set(
                "viewBox",
                (-self.margin, -self.margin, self.width + 2 * self.margin, self.height + 2 * self.margin),
            )
            .set("width", self.width + 2 * self.margin)
            .set("height", self.height + 2 * self.margin)
            .set("font-family", "sans-serif")
            .set("font-size", FONT_SIZE)
    }

    fn x_axis(&self) -> Line {
        Line::new()
            .set("x1", 0)
            .set("y1", self.height)
            .set("x2", self.width)
            .set("y2", self.height)
            .set("stroke", AXIS_COLOR)
    }

    fn label(&self, x: f64, y: f64, content: &str, anchor: &str) -> Text {
        Text::new(content)
            .set("x", x)
            .set("y", y)
            .set("text-anchor", anchor)
            .set("fill", AXIS_COLOR)
    }

    /// Lines with a translucent area underneath. `labels` are spread evenly
    /// under the x axis.
    pub fn render_line_graphs(&self, graphs: &[(Vec<Point>, GraphStyle)], labels: &[String]) -> String {
        let mut document = self.document().add(self.x_axis());

        for (points, style) in graphs {
            if !points.is_empty() {
                document = document.add(self.get_filled_area(points, style.fill_color));
                document = document.add(self.get_path(points, style.stroke_color));
            }
        }

        let step = if labels.len() > 1 {
            self.width as f64 / (labels.len() - 1) as f64
        } else {
            0.0
        };
        for (i, label) in labels.iter().enumerate() {
            let y = (self.height + FONT_SIZE + 4) as f64;
            document = document.add(self.label(i as f64 * step, y, label, "middle"));
        }

        document.to_string()
    }

    /// Vertical bars, grouped; heights are relative to `max_value`.
    pub fn render_bar_groups(&self, groups: &[BarGroup], max_value: f64) -> String {
        let mut document = self.document().add(self.x_axis());
        if groups.is_empty() {
            return document.to_string();
        }

        let group_width = self.width as f64 / groups.len() as f64;
        for (i, group) in groups.iter().enumerate() {
            let left = i as f64 * group_width;
            let bar_width = group_width * 0.8 / group.bars.len().max(1) as f64;

            for (j, bar) in group.bars.iter().enumerate() {
                let bar_height = scale(bar.value, max_value, self.height as f64);
                let x = left + group_width * 0.1 + j as f64 * bar_width;
                let y = self.height as f64 - bar_height;
                document = document
                    .add(
                        Rectangle::new()
                            .set("x", x)
                            .set("y", y)
                            .set("width", bar_width)
                            .set("height", bar_height)
                            .set("fill", bar.color),
                    )
                    .add(self.label(x + bar_width / 2.0, y - 2.0, &format_value(bar.value), "middle"));
            }

            let y = (self.height + FONT_SIZE + 4) as f64;
            document = document.add(self.label(left + group_width / 2.0, y, &group.label, "middle"));
        }

        document.to_string()
    }

    /// One labelled horizontal bar per row, longest relative to the largest
    /// value.
    pub fn render_horizontal_bars(&self, bars: &[(String, f64)], color: &'static str) -> String {
        let mut document = self.document();
        if bars.is_empty() {
            return document.to_string();
        }

        let max_value = bars.iter().map(|(_, value)| *value).fold(0.0, f64::max);
        let row_height = self.height as f64 / bars.len() as f64;
        let label_width = self.width as f64 * 0.3;
        let bar_extent = self.width as f64 - label_width;

        for (i, (label, value)) in bars.iter().enumerate() {
            let y = i as f64 * row_height;
            let bar_width = scale(*value, max_value, bar_extent);
            document = document
                .add(self.label(label_width - 4.0, y + row_height * 0.6, label, "end"))
                .add(
                    Rectangle::new()
                        .set("x", label_width)
                        .set("y", y + row_height * 0.1)
                        .set("width", bar_width)
                        .set("height", row_height * 0.8)
                        .set("fill", color),
                )
                .add(self.label(label_width + bar_width + 4.0, y + row_height * 0.6, &format_value(*value), "start"));
        }

        document.to_string()
    }

    fn get_path(&self, points: &[Point], color: &str) -> Path {
        let mut path_data = Data::new();
        if let Some(first) = points.first() {
            path_data = path_data.move_to((first.x, first.y));
            for point in &points[1..] {
                path_data = path_data.line_to((point.x, point.y));
            }
        }
        Path::new()
            .set("d", path_data)
            .set("stroke", color)
            .set("stroke-width", "2")
            .set("fill", "none")
    }

    fn get_filled_area(&self, points: &[Point], color: &str) -> Path {
        let mut path_data = Data::new();
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            path_data = path_data.move_to((first.x, self.height as f64));
            for point in points {
                path_data = path_data.line_to((point.x, point.y));
            }
            path_data = path_data.line_to((last.x, self.height as f64)).close();
        }
        Path::new()
            .set("d", path_data)
            .set("fill", color)
            .set("fill-opacity", "0.3")
            .set("stroke", "none")
    }
}

/// `value` as a share of `max`, stretched over `extent` pixels.
pub fn scale(value: f64, max: f64, extent: f64) -> f64 {
    if max <= 0.0 {
        0.0
    } else {
        (value / max).clamp(0.0, 1.0) * extent
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_handles_empty_range() {
        assert_eq!(scale(5.0, 0.0, 100.0), 0.0);
        assert_eq!(scale(5.0, 10.0, 100.0), 50.0);
        assert_eq!(scale(20.0, 10.0, 100.0), 100.0);
    }

    #[test]
    fn bar_groups_draw_one_rect_per_bar() {
        let renderer = Renderer::new(300, 100, 20);
        let groups = vec![
            BarGroup {
                label: "planned".to_string(),
                bars: vec![Bar { value: 4.0, color: "#4A90E2" }, Bar { value: 2.0, color: "#2ECC71" }],
            },
            BarGroup {
                label: "unplanned".to_string(),
                bars: vec![Bar { value: 1.0, color: "#4A90E2" }, Bar { value: 0.0, color: "#2ECC71" }],
            },
        ];
        let svg = renderer.render_bar_groups(&groups, 4.0);
        assert_eq!(svg.matches("<rect").count(), 4);
        assert!(svg.contains("planned"));
        assert!(svg.contains("unplanned"));
    }

    #[test]
    fn line_graphs_skip_empty_series() {
        let renderer = Renderer::new(200, 100, 10);
        let graphs = vec![
            (
                vec![Point { x: 0.0, y: 50.0 }, Point { x: 200.0, y: 10.0 }],
                GraphStyle { stroke_color: "#E74C3C", fill_color: "#E74C3C" },
            ),
            (vec![], GraphStyle { stroke_color: "#4A90E2", fill_color: "#4A90E2" }),
        ];
        let svg = renderer.render_line_graphs(&graphs, &["Sprint 1".to_string(), "Sprint 2".to_string()]);
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("Sprint 2"));
    }

    #[test]
    fn horizontal_bars_are_labelled() {
        let renderer = Renderer::new(200, 60, 10);
        let svg = renderer.render_horizontal_bars(
            &[("support".to_string(), 3.0), ("incident".to_string(), 1.0)],
            "#F5A623",
        );
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains("support"));
        assert!(svg.contains("incident"));
        assert!(renderer.render_horizontal_bars(&[], "#F5A623").contains("<svg"));
    }
}
