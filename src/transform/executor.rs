//! Transform executor.
//!
//! Applies a [`TransformSpec`] to raw records, producing enriched records.
//! The executor is a pure function of its inputs: it performs no I/O, and
//! every derived column is a deterministic function of the declared input
//! columns, so re-transforming an already-enriched record reproduces the
//! same derived values.
//!
//! Median filling needs two passes: the first coerces numeric columns and
//! computes each fill column's median over the whole batch, the second
//! substitutes and derives.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::collections::HashSet;

use super::spec::{FillPolicy, MissingInputPolicy, TransformSpec};
use crate::error::TransformError;

/// Result of applying a transform spec.
#[derive(Debug)]
pub struct TransformOutcome {
    /// Enriched records, one per surviving input record, in input order.
    pub records: Vec<Value>,
    /// Records dropped by the validity filter.
    pub skipped: Vec<SkippedRecord>,
    /// The medians substituted into fill columns, by column name.
    pub medians: BTreeMap<String, f64>,
}

/// A record dropped by the validity filter.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    /// Index in the input sequence.
    pub row: usize,
    pub reason: String,
}

impl TransformOutcome {
    /// Summary line for logs.
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} records, {} skipped",
            self.records.len(),
            self.skipped.len()
        )
    }
}

/// Apply a spec to raw records.
pub fn transform(records: &[Value], spec: &TransformSpec) -> Result<TransformOutcome, TransformError> {
    spec.check()?;

    let numeric_names: HashSet<&str> = spec.numeric.iter().map(|c| c.name.as_str()).collect();
    let timestamp_column = spec.timestamp.as_ref().map(|t| t.column.as_str());

    // Pass 1: coerce numerics, apply the validity filter, collect medians.
    let mut working: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let Some(obj) = record.as_object() else {
            skipped.push(SkippedRecord {
                row,
                reason: "Record is not a JSON object".to_string(),
            });
            continue;
        };

        let mut working_record = obj.clone();
        for column in &spec.numeric {
            if let Some(value) = working_record.get_mut(&column.name) {
                *value = coerce_numeric(value);
            }
        }

        if !spec.require_any_of.is_empty() {
            let all_missing = spec
                .require_any_of
                .iter()
                .all(|c| is_missing(working_record.get(c)));
            if all_missing {
                skipped.push(SkippedRecord {
                    row,
                    reason: format!("All of [{}] missing", spec.require_any_of.join(", ")),
                });
                continue;
            }
        }

        working.push(working_record);
    }

    let mut medians = BTreeMap::new();
    for column in spec.numeric.iter().filter(|c| c.fill == FillPolicy::Median) {
        let mut values: Vec<f64> = working
            .iter()
            .filter_map(|r| r.get(&column.name).and_then(Value::as_f64))
            .collect();
        if let Some(median) = median_of(&mut values) {
            medians.insert(column.name.clone(), median);
        }
    }

    // Pass 2: fill and derive.
    for record in &mut working {
        for column in spec.numeric.iter().filter(|c| c.fill == FillPolicy::Median) {
            if is_missing(record.get(&column.name)) {
                if let Some(median) = medians.get(&column.name) {
                    record.insert(column.name.clone(), Value::from(*median));
                }
            }
        }

        if let Some(sentinel) = &spec.categorical_fill {
            for (key, value) in record.iter_mut() {
                if numeric_names.contains(key.as_str()) || Some(key.as_str()) == timestamp_column {
                    continue;
                }
                if value_is_missing(value) {
                    *value = Value::String(sentinel.clone());
                }
            }
        }

        if let Some(score) = &spec.score {
            let value = compute_score(record, score);
            record.insert(score.target.clone(), value);
        }

        for band in &spec.bands {
            let label = record
                .get(&band.source)
                .and_then(Value::as_f64)
                .map(|v| assign_band(v, &band.boundaries, &band.labels));
            record.insert(
                band.target.clone(),
                label.map(|l| Value::String(l.to_string())).unwrap_or(Value::Null),
            );
        }

        for code in &spec.codes {
            let value = apply_code(record.get(&code.source), code);
            record.insert(code.target.clone(), value);
        }

        if let Some(ts) = &spec.timestamp {
            let parsed = record
                .get(&ts.column)
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            match parsed {
                Some(dt) => {
                    record.insert(ts.column.clone(), Value::String(canonical_format(&dt)));
                    record.insert(ts.hour_target.clone(), Value::from(dt.hour() as i64));
                }
                None => {
                    record.insert(ts.hour_target.clone(), Value::Null);
                }
            }
        }

        for column in &spec.drop {
            record.remove(column);
        }
    }

    Ok(TransformOutcome {
        records: working.into_iter().map(Value::Object).collect(),
        skipped,
        medians,
    })
}

/// Assign a value into a band: lower edge inclusive, upper edge exclusive,
/// final band unbounded above.
pub fn assign_band<'a>(value: f64, boundaries: &[f64], labels: &'a [String]) -> &'a str {
    let mut index = 0;
    for boundary in boundaries {
        if value >= *boundary {
            index += 1;
        } else {
            break;
        }
    }
    &labels[index]
}

/// Coerce a loosely-typed value to a JSON number, or null when it is not
/// numeric after coercion.
fn coerce_numeric(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            if let Ok(int) = trimmed.parse::<i64>() {
                return Value::from(int);
            }
            match trimmed.parse::<f64>() {
                Ok(float) if float.is_finite() => Value::from(float),
                _ => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

/// Median of a batch, mean of the middle pair for even counts.
fn median_of(values: &mut Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

fn compute_score(record: &Map<String, Value>, score: &super::spec::ScoreSpec) -> Value {
    let mut total = 0.0;
    for input in &score.weights {
        match record.get(&input.column).and_then(Value::as_f64) {
            Some(v) => total += v * input.weight,
            None => match score.missing {
                MissingInputPolicy::Propagate => return Value::Null,
                MissingInputPolicy::ZeroFill => {}
            },
        }
    }
    Value::from(total)
}

fn apply_code(value: Option<&Value>, code: &super::spec::CodeMap) -> Value {
    let key = match value {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    };
    match key.and_then(|k| code.map.get(&k).copied()) {
        Some(mapped) => Value::from(mapped),
        None => code.fallback.map(Value::from).unwrap_or(Value::Null),
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(v) => value_is_missing(v),
    }
}

fn value_is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parse a timestamp in RFC 3339 or the common naive forms.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    const FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    None
}

/// Canonical textual form used both in enriched records and on the wire.
pub fn canonical_format(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Canonicalize a timestamp string, if it parses.
pub fn canonical_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| canonical_format(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::spec::{BandSpec, CodeMap, NumericColumn, ScoreSpec, WeightedInput};
    use serde_json::json;

    fn churn_records() -> Vec<Value> {
        vec![
            json!({
                "customerID": "0001-A", "gender": "Female", "tenure": 2,
                "MonthlyCharges": 29.85, "TotalCharges": "29.85",
                "InternetService": "DSL", "MultipleLines": "No",
                "Contract": "Month-to-month", "Churn": "No"
            }),
            json!({
                "customerID": "0002-B", "gender": "Male", "tenure": 45,
                "MonthlyCharges": 84.5, "TotalCharges": " ",
                "InternetService": "Fiber optic", "MultipleLines": "Yes",
                "Contract": "Two year", "Churn": "No"
            }),
            json!({
                "customerID": "0003-C", "gender": "Male", "tenure": 12,
                "MonthlyCharges": 55.0, "TotalCharges": "660.0",
                "InternetService": "No", "MultipleLines": null,
                "Contract": "One year", "Churn": "Yes"
            }),
        ]
    }

    #[test]
    fn test_median_fill() {
        let spec = TransformSpec::churn();
        let outcome = transform(&churn_records(), &spec).unwrap();

        // TotalCharges: [29.85, missing, 660.0] -> median of present = 344.925
        let expected = (29.85 + 660.0) / 2.0;
        assert_eq!(outcome.medians["TotalCharges"], expected);
        assert_eq!(outcome.records[1]["TotalCharges"], expected);

        // No missing values remain in fill columns.
        for record in &outcome.records {
            assert!(record["tenure"].is_number());
            assert!(record["MonthlyCharges"].is_number());
            assert!(record["TotalCharges"].is_number());
        }
    }

    #[test]
    fn test_band_boundary_lower_inclusive() {
        let spec = TransformSpec::churn();
        let records = vec![
            json!({"tenure": 11, "MonthlyCharges": 30.0, "TotalCharges": 1.0}),
            json!({"tenure": 12, "MonthlyCharges": 29.0, "TotalCharges": 1.0}),
            json!({"tenure": 60, "MonthlyCharges": 70.0, "TotalCharges": 1.0}),
        ];
        let outcome = transform(&records, &spec).unwrap();

        assert_eq!(outcome.records[0]["tenure_group"], "New");
        assert_eq!(outcome.records[1]["tenure_group"], "Regular");
        assert_eq!(outcome.records[2]["tenure_group"], "Champion");

        // The same policy holds for the charge segment.
        assert_eq!(outcome.records[0]["monthly_charge_segment"], "Medium");
        assert_eq!(outcome.records[1]["monthly_charge_segment"], "Low");
        assert_eq!(outcome.records[2]["monthly_charge_segment"], "High");
    }

    #[test]
    fn test_code_maps_with_fallback() {
        let spec = TransformSpec::churn();
        let records = vec![json!({
            "tenure": 1, "MonthlyCharges": 1.0, "TotalCharges": 1.0,
            "InternetService": "Satellite", "MultipleLines": null,
            "Contract": "Month-to-month"
        })];
        let outcome = transform(&records, &spec).unwrap();
        let record = &outcome.records[0];

        // Unknown category -> null, never an error.
        assert_eq!(record["has_internet_service"], Value::Null);
        // Missing MultipleLines maps through the constant fallback.
        assert_eq!(record["is_multi_line_user"], 0);
        assert_eq!(record["contract_type_code"], 0);
    }

    #[test]
    fn test_categorical_fill_and_drop() {
        let spec = TransformSpec::churn();
        let records = vec![json!({
            "customerID": "0004-D", "gender": "Female",
            "tenure": 5, "MonthlyCharges": 20.0, "TotalCharges": 100.0,
            "Churn": null, "InternetService": "DSL",
            "MultipleLines": "No", "Contract": "One year"
        })];
        let outcome = transform(&records, &spec).unwrap();
        let record = outcome.records[0].as_object().unwrap();

        assert_eq!(record["Churn"], "Unknown");
        assert!(!record.contains_key("customerID"));
        assert!(!record.contains_key("gender"));
    }

    #[test]
    fn test_numeric_as_string_coercion() {
        let spec = TransformSpec::churn();
        let records = vec![
            json!({
                "tenure": "24", "MonthlyCharges": " 45.3 ", "TotalCharges": "n/a",
                "Contract": "One year"
            }),
            json!({
                "tenure": 3, "MonthlyCharges": 20.0, "TotalCharges": 100.0,
                "Contract": "One year"
            }),
        ];
        let outcome = transform(&records, &spec).unwrap();
        let record = &outcome.records[0];

        assert_eq!(record["tenure"], 24);
        assert_eq!(record["MonthlyCharges"], 45.3);
        // "n/a" is not numeric after coercion, so it is missing and the
        // batch median fills it.
        assert_eq!(record["TotalCharges"], 100.0);
    }

    #[test]
    fn test_idempotence_on_enriched_records() {
        let spec = TransformSpec::churn();
        let first = transform(&churn_records(), &spec).unwrap();
        let second = transform(&first.records, &spec).unwrap();
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_severity_propagates_missing_inputs() {
        let spec = TransformSpec::air_quality();
        let records = vec![
            json!({
                "city": "delhi", "time": "2024-03-01T05:00",
                "pm10": 40.0, "pm2_5": 84.0, "carbon_monoxide": 1.2,
                "nitrogen_dioxide": 31.0, "sulphur_dioxide": 8.0, "ozone": 22.0,
                "uv_index": null
            }),
            json!({
                "city": "delhi", "time": "2024-03-01T06:00",
                "pm10": 40.0, "pm2_5": null, "carbon_monoxide": 1.2,
                "nitrogen_dioxide": 31.0, "sulphur_dioxide": 8.0, "ozone": 22.0,
                "uv_index": null
            }),
        ];
        let outcome = transform(&records, &spec).unwrap();

        let expected = 84.0 * 5.0 + 40.0 * 3.0 + 31.0 * 4.0 + 8.0 * 4.0 + 1.2 * 2.0 + 22.0 * 3.0;
        assert_eq!(outcome.records[0]["severity_score"], expected);
        assert_eq!(outcome.records[0]["risk_flag"], "High Risk");

        // One missing pollutant: the score and its dependent band are null,
        // not a zero-filled proxy.
        assert_eq!(outcome.records[1]["severity_score"], Value::Null);
        assert_eq!(outcome.records[1]["risk_flag"], Value::Null);
        // The AQI band reads pm2_5 directly and is null with it.
        assert_eq!(outcome.records[1]["aqi_category"], Value::Null);
    }

    #[test]
    fn test_validity_filter_drops_all_missing() {
        let spec = TransformSpec::air_quality();
        let records = vec![
            json!({
                "city": "delhi", "time": "2024-03-01T05:00",
                "pm10": null, "pm2_5": null, "carbon_monoxide": null,
                "nitrogen_dioxide": null, "sulphur_dioxide": null, "ozone": null,
                "uv_index": 3.0
            }),
            json!({
                "city": "delhi", "time": "2024-03-01T06:00",
                "pm10": 12.0, "pm2_5": null, "carbon_monoxide": null,
                "nitrogen_dioxide": null, "sulphur_dioxide": null, "ozone": null,
                "uv_index": null
            }),
        ];
        let outcome = transform(&records, &spec).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].row, 0);
    }

    #[test]
    fn test_timestamp_hour_and_canonical_form() {
        let spec = TransformSpec::air_quality();
        let records = vec![json!({
            "city": "delhi", "time": "2024-03-01T05:00",
            "pm10": 1.0, "pm2_5": 1.0, "carbon_monoxide": 1.0,
            "nitrogen_dioxide": 1.0, "sulphur_dioxide": 1.0, "ozone": 1.0,
            "uv_index": null
        })];
        let outcome = transform(&records, &spec).unwrap();

        assert_eq!(outcome.records[0]["time"], "2024-03-01T05:00:00");
        assert_eq!(outcome.records[0]["hour"], 5);
    }

    #[test]
    fn test_assign_band_edges() {
        let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let boundaries = [10.0, 20.0];

        assert_eq!(assign_band(9.9, &boundaries, &labels), "a");
        assert_eq!(assign_band(10.0, &boundaries, &labels), "b");
        assert_eq!(assign_band(19.99, &boundaries, &labels), "b");
        assert_eq!(assign_band(20.0, &boundaries, &labels), "c");
        assert_eq!(assign_band(1e9, &boundaries, &labels), "c");
    }

    #[test]
    fn test_median_of() {
        assert_eq!(median_of(&mut vec![]), None);
        assert_eq!(median_of(&mut vec![3.0]), Some(3.0));
        assert_eq!(median_of(&mut vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_of(&mut vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2024-03-01T05:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T05:00:00+05:30").is_some());
        assert!(parse_timestamp("2024-03-01T05:00").is_some());
        assert!(parse_timestamp("2024-03-01 05:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_score_zero_fill_policy() {
        let mut spec = TransformSpec::new();
        spec.numeric = vec![NumericColumn::new("a"), NumericColumn::new("b")];
        spec.score = Some(ScoreSpec {
            target: "s".into(),
            weights: vec![
                WeightedInput { column: "a".into(), weight: 2.0 },
                WeightedInput { column: "b".into(), weight: 3.0 },
            ],
            missing: MissingInputPolicy::ZeroFill,
        });

        let outcome = transform(&[json!({"a": 5.0, "b": null})], &spec).unwrap();
        assert_eq!(outcome.records[0]["s"], 10.0);
    }

    #[test]
    fn test_band_on_derived_score() {
        let mut spec = TransformSpec::new();
        spec.numeric = vec![NumericColumn::new("a")];
        spec.score = Some(ScoreSpec {
            target: "s".into(),
            weights: vec![WeightedInput { column: "a".into(), weight: 10.0 }],
            missing: MissingInputPolicy::Propagate,
        });
        spec.bands = vec![BandSpec {
            source: "s".into(),
            target: "s_band".into(),
            boundaries: vec![50.0],
            labels: ["low", "high"].iter().map(|s| s.to_string()).collect(),
        }];

        let outcome = transform(&[json!({"a": 7.0})], &spec).unwrap();
        assert_eq!(outcome.records[0]["s"], 70.0);
        assert_eq!(outcome.records[0]["s_band"], "high");
    }

    #[test]
    fn test_code_map_unknown_without_fallback() {
        let mut spec = TransformSpec::new();
        spec.codes = vec![CodeMap {
            source: "kind".into(),
            target: "kind_code".into(),
            map: [("x".to_string(), 1i64)].into_iter().collect(),
            fallback: None,
        }];

        let outcome = transform(&[json!({"kind": "y"})], &spec).unwrap();
        assert_eq!(outcome.records[0]["kind_code"], Value::Null);
    }
}
