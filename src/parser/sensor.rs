//! Raw sensor document normalization.
//!
//! Air-quality documents arrive in two shapes, depending on which upstream
//! API produced them:
//!
//! - **station measurements**: `{"results": [{"measurements": [{"parameter",
//!   "value", "lastUpdated"}, ..]}, ..]}` — one reading per pollutant per
//!   station entry.
//! - **hourly time series**: `{"hourly": {"time": [..], "pm10": [..], ..}}`
//!   — parallel arrays keyed by pollutant, indexed by timestamp position.
//!
//! Both normalize into the same record schema: `city`, `time`, the six
//! pollutant columns and `uv_index`. A pollutant without a reading stays an
//! explicit null, never an absent column, so every record carries the full
//! column set. A document matching neither shape is a [`ShapeError`]; the
//! caller skips it and continues with the remaining documents.

use serde_json::{Map, Value};

use crate::error::{ShapeError, ShapeResult};

/// The pollutant columns every normalized record carries.
pub const POLLUTANT_COLUMNS: [&str; 6] = [
    "pm10",
    "pm2_5",
    "carbon_monoxide",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "ozone",
];

/// Map an upstream pollutant identifier to its normalized column name.
/// Already-normalized names map to themselves.
pub fn map_pollutant(parameter: &str) -> Option<&'static str> {
    match parameter.trim().to_lowercase().as_str() {
        "pm10" => Some("pm10"),
        "pm25" | "pm2.5" | "pm2_5" => Some("pm2_5"),
        "co" | "carbon_monoxide" => Some("carbon_monoxide"),
        "no2" | "nitrogen_dioxide" => Some("nitrogen_dioxide"),
        "so2" | "sulphur_dioxide" => Some("sulphur_dioxide"),
        "o3" | "ozone" => Some("ozone"),
        _ => None,
    }
}

/// One record with every column present and null.
fn blank_record(city: &str) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("city".to_string(), Value::String(city.to_string()));
    record.insert("time".to_string(), Value::Null);
    for column in POLLUTANT_COLUMNS {
        record.insert(column.to_string(), Value::Null);
    }
    record.insert("uv_index".to_string(), Value::Null);
    record
}

/// Normalize one raw document into records.
///
/// `city` is supplied by the caller (it is encoded in the file name
/// upstream, not in the document body).
pub fn normalize_document(city: &str, doc: &Value) -> ShapeResult<Vec<Value>> {
    if let Some(results) = doc.get("results").and_then(Value::as_array) {
        Ok(normalize_stations(city, results))
    } else if let Some(hourly) = doc.get("hourly").and_then(Value::as_object) {
        Ok(normalize_hourly(city, hourly))
    } else {
        Err(ShapeError::UnrecognizedShape)
    }
}

/// Station shape: one output record per measurement. A measurement whose
/// pollutant has no normalized column still yields a record (all pollutant
/// columns null); the transform-stage validity filter drops it.
fn normalize_stations(city: &str, results: &[Value]) -> Vec<Value> {
    let mut records = Vec::new();

    for station in results {
        let measurements = station
            .get("measurements")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for measurement in measurements {
            let mut record = blank_record(city);

            if let Some(time) = measurement.get("lastUpdated") {
                record.insert("time".to_string(), time.clone());
            }

            let parameter = measurement.get("parameter").and_then(Value::as_str);
            if let Some(column) = parameter.and_then(map_pollutant) {
                let value = measurement.get("value").cloned().unwrap_or(Value::Null);
                record.insert(column.to_string(), value);
            }

            records.push(Value::Object(record));
        }
    }

    records
}

/// Hourly shape: one output record per timestamp position.
fn normalize_hourly(city: &str, hourly: &Map<String, Value>) -> Vec<Value> {
    let times = hourly
        .get("time")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut records = Vec::with_capacity(times.len());

    for (i, time) in times.iter().enumerate() {
        let mut record = blank_record(city);
        record.insert("time".to_string(), time.clone());

        for column in POLLUTANT_COLUMNS.iter().chain(std::iter::once(&"uv_index")) {
            let value = hourly
                .get(*column)
                .and_then(Value::as_array)
                .and_then(|series| series.get(i))
                .cloned()
                .unwrap_or(Value::Null);
            record.insert((*column).to_string(), value);
        }

        records.push(Value::Object(record));
    }

    records
}

/// Derive the city name from a document file stem.
/// Files are named `<city>_raw_<timestamp>.json` upstream.
pub fn city_from_stem(stem: &str) -> &str {
    stem.split('_').next().unwrap_or(stem)
}
