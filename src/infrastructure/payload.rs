// Adapters from loosely shaped JSON payloads to domain types
//
// The backend is not consistent about shapes (bare arrays vs `{items}`,
// `ts` vs `timestamp`, numeric strings). Everything is normalised here so the
// rest of the crate only sees one shape. Malformed input degrades to empty
// values instead of errors.
use crate::domain::mesh::{MeshDescriptor, ModelParams, SimulationResult};
use crate::domain::telemetry::{SensorReading, TimeSample, TimeSeries};
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

pub const DISPLACEMENT: &str = "displacement";
pub const VOLTAGE: &str = "voltage";
pub const RAW_ADC: &str = "raw_adc";

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "ts", "time"];

/// First key present with a non-null value.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Epoch milliseconds from a number, a numeric string or an ISO-8601 string.
pub fn timestamp_ms(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Some(ms);
            }
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.timestamp_millis());
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|t| t.and_utc().timestamp_millis())
        }
        _ => None,
    }
}

/// Bare array or `{ items: [...] }`; anything else is empty.
fn rows(v: &Value) -> &[Value] {
    match v {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

pub fn sensor_reading(v: &Value) -> Option<SensorReading> {
    let obj = v.as_object()?;
    Some(SensorReading {
        timestamp_ms: field(obj, TIMESTAMP_KEYS).and_then(timestamp_ms),
        displacement_mm: field(obj, &["displacement", "disp_mm"]).and_then(number),
        voltage_v: field(obj, &["voltage", "voltage_dc"]).and_then(number),
        raw_adc: field(obj, &["rawAdc", "adc_raw", "raw_adc"]).and_then(number),
    })
}

/// One series per measured quantity. Rows without a timestamp are dropped;
/// rows with a missing measurement become gaps.
pub fn sensor_series(v: &Value) -> Vec<TimeSeries> {
    let readings: Vec<(i64, SensorReading)> = rows(v)
        .iter()
        .filter_map(sensor_reading)
        .filter_map(|r| r.timestamp_ms.map(|ts| (ts, r)))
        .collect();

    let series = |name: &str, pick: fn(&SensorReading) -> Option<f64>| {
        TimeSeries::new(
            name,
            readings
                .iter()
                .map(|(ts, r)| TimeSample::new(*ts, pick(r)))
                .collect(),
        )
    };

    vec![
        series(DISPLACEMENT, |r| r.displacement_mm),
        series(VOLTAGE, |r| r.voltage_v),
        series(RAW_ADC, |r| r.raw_adc),
    ]
}

/// Flat numbers, or nested arrays flattened one level (`[[x, y, z], ...]`).
/// Any non-numeric entry rejects the whole buffer.
fn flat_numbers(v: &Value) -> Option<Vec<f64>> {
    let items = v.as_array()?;
    let mut out = Vec::with_capacity(items.len() * 3);
    for item in items {
        match item {
            Value::Array(inner) => {
                for x in inner {
                    out.push(x.as_f64()?);
                }
            }
            other => out.push(other.as_f64()?),
        }
    }
    Some(out)
}

fn mesh(obj: &Map<String, Value>) -> Option<MeshDescriptor> {
    let vertices = flat_numbers(obj.get("vertices")?)?;
    let indices = flat_numbers(obj.get("indices")?)?
        .into_iter()
        .map(|i| (i >= 0.0 && i.fract() == 0.0 && i <= u32::MAX as f64).then_some(i as u32))
        .collect::<Option<Vec<u32>>>()?;

    let to_f32 = |values: Vec<f64>| values.into_iter().map(|x| x as f32).collect::<Vec<f32>>();

    let scalar_field = field(obj, &["scalarField", "scalar_field", "u_mag"])
        .and_then(flat_numbers)
        .map(to_f32);
    let displacements = field(obj, &["displacements", "disp"])
        .and_then(flat_numbers)
        .map(to_f32);
    let marker = field(obj, &["marker"])
        .and_then(flat_numbers)
        .filter(|m| m.len() == 3)
        .map(|m| [m[0] as f32, m[1] as f32, m[2] as f32]);

    Some(MeshDescriptor {
        vertices: to_f32(vertices),
        indices,
        scalar_field,
        marker,
        displacements,
    })
}

fn model_params(root: &Map<String, Value>) -> ModelParams {
    let empty = Map::new();
    let object = |key: &str| root.get(key).and_then(Value::as_object).unwrap_or(&empty);
    let params = root
        .get("modelParams")
        .and_then(Value::as_object)
        .unwrap_or_else(|| object("params"));
    let model = root
        .get("modelParams")
        .and_then(Value::as_object)
        .unwrap_or_else(|| object("model"));

    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    ModelParams {
        length_m: field(model, &["L_m", "L", "length_m"]).and_then(number),
        youngs_modulus_pa: field(model, &["E_Pa", "E"]).and_then(number),
        load_n: field(params, &["P", "load_N", "load_n"])
            .or_else(|| field(model, &["P", "load_N", "load_n"]))
            .and_then(number),
        boundary_conditions: field(model, &["bc", "supports"]).map(text),
    }
}

pub fn simulation_result(v: &Value) -> Option<SimulationResult> {
    let obj = v.as_object()?;
    let status = field(obj, &["status"])
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let mesh = field(obj, &["mesh", "viz"])
        .and_then(Value::as_object)
        .and_then(mesh);

    Some(SimulationResult {
        status,
        mesh,
        model: model_params(obj),
    })
}

fn series_rows(name: &str, items: &[Value]) -> TimeSeries {
    let unit_key = format!("{}_mm", name);
    let samples = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let ts = field(row, TIMESTAMP_KEYS).and_then(timestamp_ms)?;
            let value = field(row, &["value", "v", unit_key.as_str()]).and_then(number);
            Some(TimeSample::new(ts, value))
        })
        .collect();
    TimeSeries::new(name, samples)
}

/// `{ name: [{timestamp, value}, ...], ... }`, one series per key, sorted by
/// name. A bare array is a single series called `simulation`.
pub fn simulation_series(v: &Value) -> Vec<TimeSeries> {
    match v {
        Value::Array(items) => vec![series_rows("simulation", items)],
        Value::Object(obj) => {
            let mut series: Vec<TimeSeries> = obj
                .iter()
                .filter_map(|(name, value)| value.as_array().map(|items| series_rows(name, items)))
                .collect();
            series.sort_by(|a, b| a.name.cmp(&b.name));
            series
        }
        _ => Vec::new(),
    }
}
