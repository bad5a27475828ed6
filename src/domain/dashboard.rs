// Dashboard domain model
use super::mesh::SimulationResult;
use super::telemetry::{SensorReading, TimeSeries};

pub const LOAD_FAILED_BANNER: &str = "could not load data";

/// Everything one live dashboard shows. Each slot is replaced wholesale by
/// the poller; nothing is merged incrementally.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub client_id: String,
    pub now_ms: i64,
    pub loading: bool,
    pub error: Option<String>,
    pub latest: Option<SensorReading>,
    pub sensor_series: Vec<TimeSeries>,
    pub simulation: Option<SimulationResult>,
    pub simulation_series: Vec<TimeSeries>,
}

impl DashboardSnapshot {
    pub fn new(client_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            client_id: client_id.into(),
            now_ms,
            loading: true,
            ..Default::default()
        }
    }

    /// Series by name, looking at the sensor series first.
    pub fn series(&self, name: &str) -> Option<&TimeSeries> {
        self.sensor_series
            .iter()
            .chain(self.simulation_series.iter())
            .find(|s| s.name == name)
    }
}
