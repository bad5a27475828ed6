// SVG output for a laid-out time window chart
use super::time_window_chart::ChartGeometry;
use std::fmt::Write;

const GRID_OPACITY: f64 = 0.12;
const AXIS_OPACITY: f64 = 0.6;

pub struct ChartSvg;

impl ChartSvg {
    pub fn render(geometry: &ChartGeometry, title: &str) -> String {
        let g = geometry;
        let mut svg = String::with_capacity(4096);

        // writing into a String cannot fail
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" font-family="sans-serif">"#,
            g.width, g.height
        );
        let _ = writeln!(svg, "<title>{}</title>", escape(title));

        for tick in &g.x_ticks {
            let _ = writeln!(
                svg,
                r#"<line x1="{x:.2}" x2="{x:.2}" y1="{}" y2="{}" stroke="currentColor" opacity="{}"/>"#,
                g.plot_top,
                g.plot_bottom,
                GRID_OPACITY,
                x = tick.position
            );
        }
        for tick in &g.y_ticks {
            let _ = writeln!(
                svg,
                r#"<line x1="{}" x2="{}" y1="{y:.2}" y2="{y:.2}" stroke="currentColor" opacity="{}"/>"#,
                g.plot_left,
                g.plot_right,
                GRID_OPACITY,
                y = tick.position
            );
        }

        let _ = writeln!(
            svg,
            r#"<line x1="{}" x2="{}" y1="{b}" y2="{b}" stroke="currentColor" opacity="{}"/>"#,
            g.plot_left,
            g.plot_right,
            AXIS_OPACITY,
            b = g.plot_bottom
        );
        let _ = writeln!(
            svg,
            r#"<line x1="{l}" x2="{l}" y1="{}" y2="{}" stroke="currentColor" opacity="{}"/>"#,
            g.plot_top,
            g.plot_bottom,
            AXIS_OPACITY,
            l = g.plot_left
        );

        if let Some(y0) = g.zero_line_y {
            let _ = writeln!(
                svg,
                r#"<line x1="{}" x2="{}" y1="{y:.2}" y2="{y:.2}" stroke="currentColor" opacity="0.4" stroke-dasharray="4 4"/>"#,
                g.plot_left,
                g.plot_right,
                y = y0
            );
        }

        for tick in &g.x_ticks {
            let _ = writeln!(
                svg,
                r##"<text x="{:.2}" y="{}" text-anchor="middle" font-size="10" fill="#a3a3a3">{}</text>"##,
                tick.position,
                g.height - 6.0,
                escape(&tick.label)
            );
        }
        for tick in &g.y_ticks {
            let _ = writeln!(
                svg,
                r##"<text x="{}" y="{:.2}" text-anchor="end" dominant-baseline="middle" font-size="10" fill="#a3a3a3">{}</text>"##,
                g.plot_left - 6.0,
                tick.position,
                escape(&tick.label)
            );
        }

        for path in &g.series {
            let stroke = path.color.as_deref().unwrap_or("currentColor");
            for segment in &path.segments {
                match segment.as_slice() {
                    [] => {}
                    [only] => {
                        let _ = writeln!(
                            svg,
                            r#"<circle cx="{:.2}" cy="{:.2}" r="2" fill="{}"/>"#,
                            only.x,
                            only.y,
                            escape(stroke)
                        );
                    }
                    points => {
                        let coords: Vec<String> = points
                            .iter()
                            .map(|p| format!("{:.2},{:.2}", p.x, p.y))
                            .collect();
                        let _ = writeln!(
                            svg,
                            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                            coords.join(" "),
                            escape(stroke)
                        );
                    }
                }
            }
        }

        if let Some(last) = g.last_point {
            let _ = writeln!(
                svg,
                r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="currentColor" opacity="0.9"/>"#,
                last.x, last.y
            );
        }

        svg.push_str("</svg>\n");
        svg
    }
}

pub(crate) fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
