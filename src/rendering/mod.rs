// Rendering layer - Chart layout, mesh scene and their SVG output
pub mod camera;
pub mod chart_svg;
pub mod color_ramp;
pub mod mesh_scene;
pub mod mesh_svg;
pub mod mesh_viewer;
pub mod time_window_chart;
