use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub viewer: ViewerSettings,
    pub display: DisplaySettings,
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub max_dashboards: usize,
    /// A dashboard nobody has requested for this long is stopped.
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_dashboards: 32,
            idle_ttl_secs: 300,
            sweep_interval_secs: 30,
        }
    }
}

/// Upstream REST API. Paths are templates; `${client}` and friends are
/// substituted per request.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub latest_path: String,
    pub stream_path: String,
    pub simulation_path: String,
    pub simulation_series_path: String,
    pub send_code_path: String,
    pub verify_code_path: String,
    pub stream_window: String,
    pub stream_limit: u32,
    pub simulation_window_secs: u64,
    pub simulation_limit: u32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.biostrucx.com".to_string(),
            latest_path: "/api/sensors/latest/${client}".to_string(),
            stream_path: "/api/sensors/stream/${client}?window=${window}&limit=${limit}".to_string(),
            simulation_path: "/api/simulations/${client}/latest".to_string(),
            simulation_series_path:
                "/api/simulations/${client}/series?windowSec=${window_secs}&limit=${limit}".to_string(),
            send_code_path: "/send-code".to_string(),
            verify_code_path: "/verify-code".to_string(),
            stream_window: "5m".to_string(),
            stream_limit: 300,
            simulation_window_secs: 300,
            simulation_limit: 300,
            request_timeout_secs: Some(15),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingSettings {
    pub data_interval_ms: u64,
    pub clock_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            data_interval_ms: 5000,
            clock_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ViewerSettings {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
    pub deformation_scale: f32,
    pub show_undeformed: bool,
    pub show_wireframe: bool,
    pub interactive_camera: bool,
    pub default_marker: Option<[f32; 3]>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 220,
            refresh_hz: 30,
            deformation_scale: 50.0,
            show_undeformed: true,
            show_wireframe: false,
            interactive_camera: true,
            default_marker: Some([0.5, 0.0, 0.0]),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DisplaySettings {
    /// Offset applied to wall-clock tick labels.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub title: String,
    pub unit: Option<String>,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    #[serde(default)]
    pub show_zero_line: bool,
    #[serde(default)]
    pub highlight_last: bool,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    /// Name of the series in the dashboard snapshot.
    pub source: String,
    pub color: Option<String>,
}

fn default_window_seconds() -> u64 {
    300
}

impl ChartConfig {
    /// The two charts of the live page: simulated displacement on an
    /// auto-scaled axis, measured displacement on a fixed 0..5 mm axis.
    pub fn defaults() -> Vec<ChartConfig> {
        vec![
            ChartConfig {
                id: "fem".to_string(),
                title: "Theoretical displacement (FEM) vs time".to_string(),
                unit: Some("mm".to_string()),
                window_seconds: 300,
                y_min: None,
                y_max: None,
                show_zero_line: true,
                highlight_last: true,
                series: vec![SeriesConfig {
                    source: "fem".to_string(),
                    color: None,
                }],
            },
            ChartConfig {
                id: "real".to_string(),
                title: "Measured displacement vs time".to_string(),
                unit: Some("mm".to_string()),
                window_seconds: 300,
                y_min: Some(0.0),
                y_max: Some(5.0),
                show_zero_line: false,
                highlight_last: false,
                series: vec![SeriesConfig {
                    source: "displacement".to_string(),
                    color: None,
                }],
            },
        ]
    }
}

/// Defaults, then `config/dashboard.{toml,yaml,json}` if present, then
/// `BSX__SECTION__KEY` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("BSX")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let mut app: AppConfig = settings.try_deserialize()?;
    if app.charts.is_empty() {
        app.charts = ChartConfig::defaults();
    }
    Ok(app)
}

/// Replace template variables in a path template
pub fn prepare_path(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, &urlencoding::encode(value));
    }
    result
}
