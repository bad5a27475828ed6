// SVG output for a projected mesh frame
use super::chart_svg::escape;
use super::mesh_scene::Frame;
use glam::Vec2;
use std::fmt::Write;

pub struct MeshSvg;

impl MeshSvg {
    pub fn render(frame: &Frame) -> String {
        let mut svg = String::with_capacity(256 + frame.triangles.len() * 96);
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" font-family="sans-serif">"#,
            frame.width, frame.height
        );

        if let Some(reason) = &frame.placeholder {
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="middle" dominant-baseline="middle" font-size="14" fill="currentColor">{}</text>"#,
                frame.width as f32 / 2.0,
                frame.height as f32 / 2.0,
                escape(reason)
            );
        }

        for tri in &frame.reference {
            let _ = writeln!(
                svg,
                r#"<polygon points="{}" fill="none" stroke="currentColor" stroke-opacity="0.15"/>"#,
                points(tri)
            );
        }

        for tri in &frame.triangles {
            let fill = tri.fill.to_hex();
            let _ = writeln!(
                svg,
                r#"<polygon points="{}" fill="{fill}" stroke="{fill}" stroke-width="0.5"/>"#,
                points(&tri.points)
            );
        }

        for [a, b] in &frame.edges {
            let _ = writeln!(
                svg,
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="currentColor" stroke-opacity="0.5" stroke-width="0.75"/>"#,
                a.x, a.y, b.x, b.y
            );
        }

        if let Some((center, radius)) = frame.marker {
            let _ = writeln!(
                svg,
                r##"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="#ef4444" stroke="#ffffff" stroke-opacity="0.7"/>"##,
                center.x, center.y, radius
            );
        }

        svg.push_str("</svg>\n");
        svg
    }
}

fn points(corners: &[Vec2]) -> String {
    corners
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}
