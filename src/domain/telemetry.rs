// Telemetry data domain models

/// A single reading in a series. `value: None` marks a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    pub timestamp_ms: i64,
    pub value: Option<f64>,
}

impl TimeSample {
    pub fn new(timestamp_ms: i64, value: Option<f64>) -> Self {
        Self { timestamp_ms, value }
    }

    /// Present and finite. NaN and infinities count as gaps.
    pub fn finite_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub name: String,
    pub color: Option<String>,
    pub samples: Vec<TimeSample>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, samples: Vec<TimeSample>) -> Self {
        Self {
            name: name.into(),
            color: None,
            samples,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Samples inside `[start_ms, end_ms]`, sorted by timestamp.
    /// Input order is not trusted; equal timestamps keep their arrival order.
    pub fn window(&self, start_ms: i64, end_ms: i64) -> Vec<TimeSample> {
        let mut rows: Vec<TimeSample> = self
            .samples
            .iter()
            .copied()
            .filter(|s| s.timestamp_ms >= start_ms && s.timestamp_ms <= end_ms)
            .collect();
        rows.sort_by_key(|s| s.timestamp_ms);
        rows
    }

    /// Last sample (by timestamp) carrying a finite value.
    pub fn last_sample(&self) -> Option<TimeSample> {
        self.samples
            .iter()
            .filter(|s| s.finite_value().is_some())
            .max_by_key(|s| s.timestamp_ms)
            .copied()
    }
}

/// Latest raw sensor record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    pub timestamp_ms: Option<i64>,
    pub displacement_mm: Option<f64>,
    pub voltage_v: Option<f64>,
    pub raw_adc: Option<f64>,
}
