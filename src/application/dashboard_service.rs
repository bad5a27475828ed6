// Dashboard service - Turns a polled snapshot into charts and a page view
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::telemetry::TimeSeries;
use crate::infrastructure::config::{ChartConfig, DisplaySettings};
use crate::rendering::chart_svg::ChartSvg;
use crate::rendering::time_window_chart::{ChartOptions, SeriesPath, TimeWindowChart};
use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatestReadingView {
    pub timestamp_ms: Option<i64>,
    pub displacement_mm: Option<f64>,
    pub voltage_v: Option<f64>,
    pub raw_adc: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelHeader {
    pub length_m: Option<f64>,
    pub youngs_modulus_gpa: Option<f64>,
    pub load_kn: Option<f64>,
    pub boundary_conditions: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct LegendRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartSummary {
    pub id: String,
    pub title: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardView {
    pub client_id: String,
    pub now_ms: i64,
    pub loading: bool,
    pub banner: Option<String>,
    pub latest: Option<LatestReadingView>,
    pub simulation_status: Option<String>,
    pub simulation_done: bool,
    pub model: Option<ModelHeader>,
    pub legend: Option<LegendRange>,
    pub last_simulated: Option<f64>,
    pub charts: Vec<ChartSummary>,
}

struct ChartBinding {
    config: ChartConfig,
    chart: TimeWindowChart,
}

#[derive(Clone)]
pub struct DashboardService {
    charts: std::sync::Arc<Vec<ChartBinding>>,
}

impl DashboardService {
    pub fn new(charts: &[ChartConfig], display: &DisplaySettings) -> Self {
        let utc_offset = display_offset(display.utc_offset_minutes);
        let charts = charts
            .iter()
            .map(|config| ChartBinding {
                chart: TimeWindowChart::new(chart_options(config, utc_offset)),
                config: config.clone(),
            })
            .collect();

        Self {
            charts: std::sync::Arc::new(charts),
        }
    }

    pub fn has_chart(&self, chart_id: &str) -> bool {
        self.charts.iter().any(|b| b.config.id == chart_id)
    }

    /// SVG for one configured chart, `None` for an unknown id. A series the
    /// snapshot does not have yet renders as an empty chart.
    pub fn render_chart(&self, chart_id: &str, snapshot: &DashboardSnapshot) -> Option<String> {
        let binding = self.charts.iter().find(|b| b.config.id == chart_id)?;

        let series: Vec<TimeSeries> = binding
            .config
            .series
            .iter()
            .map(|s| {
                let found = snapshot
                    .series(&s.source)
                    .cloned()
                    .unwrap_or_else(|| TimeSeries::new(s.source.clone(), Vec::new()));
                match &s.color {
                    Some(color) => found.with_color(color.clone()),
                    None => found,
                }
            })
            .collect();

        let geometry = binding.chart.layout(&series, snapshot.now_ms);
        tracing::trace!(
            "Chart {} for {}: {} points",
            chart_id,
            snapshot.client_id,
            geometry.series.iter().map(SeriesPath::point_count).sum::<usize>()
        );
        Some(ChartSvg::render(&geometry, &binding.config.title))
    }

    pub fn view(&self, snapshot: &DashboardSnapshot) -> DashboardView {
        let simulation = snapshot.simulation.as_ref();

        DashboardView {
            client_id: snapshot.client_id.clone(),
            now_ms: snapshot.now_ms,
            loading: snapshot.loading,
            banner: snapshot.error.clone(),
            latest: snapshot.latest.as_ref().map(|r| LatestReadingView {
                timestamp_ms: r.timestamp_ms,
                displacement_mm: r.displacement_mm,
                voltage_v: r.voltage_v,
                raw_adc: r.raw_adc,
            }),
            simulation_status: simulation.map(|s| s.status.clone()),
            simulation_done: simulation.map(|s| s.is_done()).unwrap_or(false),
            model: simulation.map(|s| ModelHeader {
                length_m: s.model.length_m,
                youngs_modulus_gpa: s.model.youngs_modulus_gpa(),
                load_kn: s.model.load_kn(),
                boundary_conditions: s.model.boundary_conditions.clone(),
            }),
            legend: simulation
                .and_then(|s| s.mesh.as_ref())
                .and_then(|m| m.scalar_range())
                .map(|(min, max)| LegendRange { min, max }),
            last_simulated: latest_sample(&snapshot.simulation_series),
            charts: self
                .charts
                .iter()
                .map(|b| ChartSummary {
                    id: b.config.id.clone(),
                    title: b.config.title.clone(),
                    unit: b.config.unit.clone(),
                })
                .collect(),
        }
    }
}

fn display_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
        tracing::warn!("UTC offset of {} minutes is out of range, using UTC", minutes);
        Utc.fix()
    })
}

fn chart_options(config: &ChartConfig, utc_offset: FixedOffset) -> ChartOptions {
    ChartOptions {
        window_seconds: config.window_seconds,
        fixed_range: config.y_min.zip(config.y_max),
        unit: config.unit.clone().unwrap_or_default(),
        show_zero_line: config.show_zero_line,
        highlight_last: config.highlight_last,
        utc_offset,
        ..ChartOptions::default()
    }
}

/// Most recent finite value across all series.
fn latest_sample(series: &[TimeSeries]) -> Option<f64> {
    series
        .iter()
        .filter_map(TimeSeries::last_sample)
        .max_by_key(|s| s.timestamp_ms)
        .and_then(|s| s.finite_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::LOAD_FAILED_BANNER;
    use crate::domain::mesh::{MeshDescriptor, ModelParams, SimulationResult};
    use crate::domain::telemetry::{SensorReading, TimeSample};

    fn snapshot() -> DashboardSnapshot {
        let mut snapshot = DashboardSnapshot::new("cliente_1", 300_000);
        snapshot.loading = false;
        snapshot.sensor_series = vec![TimeSeries::new(
            "displacement",
            vec![
                TimeSample::new(299_000, Some(1.0)),
                TimeSample::new(300_000, Some(2.0)),
            ],
        )];
        snapshot.simulation_series = vec![TimeSeries::new(
            "fem",
            vec![
                TimeSample::new(298_000, Some(-0.4)),
                TimeSample::new(299_000, Some(-0.5)),
                TimeSample::new(300_000, None),
            ],
        )];
        let mut mesh = MeshDescriptor::new(vec![0.0; 9], vec![0, 1, 2]);
        mesh.scalar_field = Some(vec![0.0, 0.25, 1.5]);
        snapshot.simulation = Some(SimulationResult {
            status: "done".to_string(),
            mesh: Some(mesh),
            model: ModelParams {
                length_m: Some(2.0),
                youngs_modulus_pa: Some(2.1e11),
                load_n: Some(1500.0),
                boundary_conditions: Some("cantilever".to_string()),
            },
        });
        snapshot.latest = Some(SensorReading {
            timestamp_ms: Some(300_000),
            displacement_mm: Some(2.0),
            ..Default::default()
        });
        snapshot
    }

    fn service() -> DashboardService {
        DashboardService::new(&ChartConfig::defaults(), &DisplaySettings::default())
    }

    #[test]
    fn test_view_collects_header_and_legend() {
        let view = service().view(&snapshot());

        assert_eq!(view.banner, None);
        assert!(view.simulation_done);
        let model = view.model.unwrap();
        assert_eq!(model.youngs_modulus_gpa, Some(210.0));
        assert_eq!(model.load_kn, Some(1.5));
        assert_eq!(view.legend, Some(LegendRange { min: 0.0, max: 1.5 }));
        assert_eq!(view.last_simulated, Some(-0.5));
        assert_eq!(view.latest.unwrap().displacement_mm, Some(2.0));
        let ids: Vec<&str> = view.charts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fem", "real"]);
    }

    #[test]
    fn test_view_carries_banner_without_simulation() {
        let mut snapshot = DashboardSnapshot::new("cliente_1", 0);
        snapshot.error = Some(LOAD_FAILED_BANNER.to_string());

        let view = service().view(&snapshot);
        assert_eq!(view.banner.as_deref(), Some(LOAD_FAILED_BANNER));
        assert!(view.loading);
        assert!(view.model.is_none());
        assert!(!view.simulation_done);
        assert!(view.legend.is_none());
    }

    #[test]
    fn test_render_chart_uses_configured_series() {
        let service = service();
        let svg = service.render_chart("real", &snapshot()).unwrap();
        assert!(svg.contains("Measured displacement vs time"));
        assert!(svg.contains("<polyline"));

        assert!(service.render_chart("missing", &snapshot()).is_none());
    }

    #[test]
    fn test_render_chart_without_data_draws_axes_only() {
        let svg = service()
            .render_chart("fem", &DashboardSnapshot::new("cliente_1", 0))
            .unwrap();
        assert!(!svg.contains("<polyline"));
        assert!(svg.contains("<line"));
    }

    #[test]
    fn test_chart_options_from_config() {
        let charts = ChartConfig::defaults();
        let offset = display_offset(60);

        let fem = chart_options(&charts[0], offset);
        assert_eq!(fem.fixed_range, None);
        assert!(fem.show_zero_line && fem.highlight_last);

        let real = chart_options(&charts[1], offset);
        assert_eq!(real.fixed_range, Some((0.0, 5.0)));
        assert_eq!(real.unit, "mm");
        assert_eq!(real.utc_offset.local_minus_utc(), 3600);
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(display_offset(100_000).local_minus_utc(), 0);
    }
}
