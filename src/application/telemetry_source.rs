// Source traits for live telemetry and the wall clock
use crate::domain::mesh::SimulationResult;
use crate::domain::telemetry::{SensorReading, TimeSeries};
use async_trait::async_trait;

/// Everything the live dashboard polls. Implementations normalise payloads;
/// an `Err` always means the request itself failed.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Latest raw sensor record, `None` when the backend has nothing yet
    async fn latest_reading(&self, client_id: &str) -> anyhow::Result<Option<SensorReading>>;

    /// Recent sensor readings, one series per measured quantity
    async fn sensor_series(&self, client_id: &str) -> anyhow::Result<Vec<TimeSeries>>;

    /// Latest finite-element run with its mesh
    async fn latest_simulation(&self, client_id: &str) -> anyhow::Result<Option<SimulationResult>>;

    /// Recent simulated series, keyed by name
    async fn simulation_series(&self, client_id: &str) -> anyhow::Result<Vec<TimeSeries>>;
}

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
