// Trailing-window line chart layout
//
// Pure geometry: the same series, `now` and options always produce the same
// chart. Timers and data refresh belong to the caller.
use crate::domain::telemetry::{TimeSample, TimeSeries};
use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Below this the value range is treated as collapsed.
const COLLAPSED_RANGE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
    pub window_seconds: u64,
    /// `Some((min, max))` disables auto-scaling.
    pub fixed_range: Option<(f64, f64)>,
    /// Half-height opened around a flat series.
    pub min_span: f64,
    pub pad_pct: f64,
    pub x_ticks: usize,
    pub y_ticks: usize,
    pub unit: String,
    pub show_zero_line: bool,
    pub highlight_last: bool,
    pub utc_offset: FixedOffset,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 233.0,
            padding: Padding {
                left: 34.0,
                right: 21.0,
                top: 21.0,
                bottom: 34.0,
            },
            window_seconds: 300,
            fixed_range: None,
            min_span: 0.2,
            pad_pct: 0.15,
            x_ticks: 8,
            y_ticks: 5,
            unit: String::new(),
            show_zero_line: false,
            highlight_last: false,
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub timestamp_ms: i64,
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub position: f64,
    pub label: String,
}

/// One series split into contiguous runs. Runs never bridge a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPath {
    pub name: String,
    pub color: Option<String>,
    pub segments: Vec<Vec<ChartPoint>>,
}

impl SeriesPath {
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub plot_left: f64,
    pub plot_right: f64,
    pub plot_top: f64,
    pub plot_bottom: f64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub y_range: (f64, f64),
    pub x_ticks: Vec<AxisTick>,
    pub y_ticks: Vec<AxisTick>,
    pub series: Vec<SeriesPath>,
    pub zero_line_y: Option<f64>,
    pub last_point: Option<ChartPoint>,
}

#[derive(Debug, Clone)]
pub struct TimeWindowChart {
    options: ChartOptions,
}

impl TimeWindowChart {
    pub fn new(options: ChartOptions) -> Self {
        Self { options }
    }

    pub fn layout(&self, series: &[TimeSeries], now_ms: i64) -> ChartGeometry {
        let o = &self.options;
        let end_ms = now_ms;
        let start_ms = now_ms.saturating_sub((o.window_seconds as i64).saturating_mul(1000));

        let windows: Vec<(&TimeSeries, Vec<TimeSample>)> = series
            .iter()
            .map(|s| (s, s.window(start_ms, end_ms)))
            .collect();

        let (min_v, max_v) = match self.fixed_range() {
            Some(range) => range,
            None => self.auto_range(windows.iter().flat_map(|(_, rows)| rows.iter())),
        };

        let plot_left = o.padding.left;
        let plot_right = o.width - o.padding.right;
        let plot_top = o.padding.top;
        let plot_bottom = o.height - o.padding.bottom;

        let span_ms = (end_ms - start_ms) as f64;
        let x_scale = |ts: f64| {
            let t = if span_ms > 0.0 { (ts - start_ms as f64) / span_ms } else { 0.0 };
            plot_left + t * (plot_right - plot_left)
        };
        let span_v = max_v - min_v;
        let y_scale = |v: f64| {
            let t = if span_v > 0.0 { (v - min_v) / span_v } else { 0.0 };
            plot_top + (1.0 - t) * (plot_bottom - plot_top)
        };

        let paths: Vec<SeriesPath> = windows
            .iter()
            .map(|(s, rows)| SeriesPath {
                name: s.name.clone(),
                color: s.color.clone(),
                segments: split_runs(rows)
                    .into_iter()
                    .map(|run| {
                        run.into_iter()
                            .map(|(ts, v)| ChartPoint {
                                timestamp_ms: ts,
                                value: v,
                                x: x_scale(ts as f64),
                                y: y_scale(v),
                            })
                            .collect()
                    })
                    .collect(),
            })
            .collect();

        let x_ticks = (0..=o.x_ticks)
            .map(|i| {
                let ts = start_ms as f64 + (i as f64 * span_ms) / o.x_ticks.max(1) as f64;
                AxisTick {
                    position: x_scale(ts),
                    label: self.format_time(ts.round() as i64),
                }
            })
            .collect();

        let y_ticks = (0..=o.y_ticks)
            .map(|i| {
                let v = min_v + (i as f64 * span_v) / o.y_ticks.max(1) as f64;
                AxisTick {
                    position: y_scale(v),
                    label: format_value(v, &o.unit),
                }
            })
            .collect();

        let zero_line_y = (o.show_zero_line && min_v < 0.0 && max_v > 0.0).then(|| y_scale(0.0));

        let last_point = if o.highlight_last {
            paths
                .iter()
                .flat_map(|p| p.segments.iter().flatten())
                .max_by_key(|p| p.timestamp_ms)
                .copied()
        } else {
            None
        };

        ChartGeometry {
            width: o.width,
            height: o.height,
            plot_left,
            plot_right,
            plot_top,
            plot_bottom,
            start_ms,
            end_ms,
            y_range: (min_v, max_v),
            x_ticks,
            y_ticks,
            series: paths,
            zero_line_y,
            last_point,
        }
    }

    /// A fixed range is only honoured when it is usable as a scale.
    fn fixed_range(&self) -> Option<(f64, f64)> {
        self.options
            .fixed_range
            .filter(|(lo, hi)| lo.is_finite() && hi.is_finite() && hi > lo)
    }

    fn auto_range<'a>(&self, rows: impl Iterator<Item = &'a TimeSample>) -> (f64, f64) {
        let o = &self.options;
        let extremes = rows
            .filter_map(TimeSample::finite_value)
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });

        let Some((lo, hi)) = extremes else {
            return (0.0, 1.0);
        };

        let range = hi - lo;
        if range < COLLAPSED_RANGE {
            let span = (hi.abs() * 0.2).max(o.min_span).max(f64::EPSILON);
            return (hi - span, hi + span);
        }

        let pad = range * o.pad_pct;
        let mut min_v = lo - pad;
        let mut max_v = hi + pad;
        // a one-sided scale leans a second pad toward zero, stopping at zero
        if min_v > 0.0 {
            min_v = (min_v - pad).max(0.0);
        } else if lo >= 0.0 {
            min_v = 0.0;
        }
        if max_v < 0.0 {
            max_v = (max_v + pad).min(0.0);
        } else if hi <= 0.0 {
            max_v = 0.0;
        }
        (min_v, max_v)
    }

    fn format_time(&self, ts_ms: i64) -> String {
        DateTime::from_timestamp_millis(ts_ms)
            .map(|t| {
                t.with_timezone(&self.options.utc_offset)
                    .format("%H:%M:%S")
                    .to_string()
            })
            .unwrap_or_default()
    }
}

/// Contiguous runs of finite values, in timestamp order.
fn split_runs(rows: &[TimeSample]) -> Vec<Vec<(i64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for row in rows {
        match row.finite_value() {
            Some(v) => current.push((row.timestamp_ms, v)),
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Two decimals, trailing zeros dropped: `1.50` -> `1.5`, `2.00` -> `2`.
pub fn format_value(v: f64, unit: &str) -> String {
    let mut text = format!("{:.2}", v);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    if unit.is_empty() {
        text
    } else {
        format!("{} {}", text, unit)
    }
}
