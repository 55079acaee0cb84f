//! JSON Schema validation for enriched records.
//!
//! Enriched records are checked against embedded draft-7 schemas before
//! they are handed to the loader. Schemas are embedded at compile time
//! from the `schemas/` directory:
//!
//! - `churn-enriched.json`
//! - `air-quality-enriched.json`
//!
//! Invalid records are counted and reported; they are not silently
//! dropped.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::transform::spec::DatasetKind;

static CHURN_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/churn-enriched.json"))
        .expect("Invalid embedded schema")
});

static AIR_QUALITY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/air-quality-enriched.json"))
        .expect("Invalid embedded schema")
});

/// The embedded schema for a dataset.
pub fn schema_for(kind: DatasetKind) -> &'static Value {
    match kind {
        DatasetKind::Churn => &CHURN_SCHEMA,
        DatasetKind::AirQuality => &AIR_QUALITY_SCHEMA,
    }
}

/// Validate a JSON object against a schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with the errors when invalid
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Boolean-only variant.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one enriched record against its dataset schema.
pub fn validate_record(kind: DatasetKind, data: &Value) -> Result<(), Vec<String>> {
    validate(schema_for(kind), data)
}

/// Per-record check over a whole batch.
#[derive(Debug, Clone)]
pub struct RecordCheck {
    pub valid: usize,
    pub invalid: usize,
    /// First few failures as (record index, errors).
    pub errors: Vec<(usize, Vec<String>)>,
}

/// How many failing records keep their full error lists.
const MAX_STORED_ERRORS: usize = 10;

/// Check every record against the dataset schema.
pub fn check_records(records: &[Value], kind: DatasetKind) -> RecordCheck {
    let mut valid = 0;
    let mut invalid = 0;
    let mut errors = Vec::new();

    for (i, record) in records.iter().enumerate() {
        match validate_record(kind, record) {
            Ok(()) => valid += 1,
            Err(errs) => {
                invalid += 1;
                if errors.len() < MAX_STORED_ERRORS {
                    errors.push((i, errs));
                }
            }
        }
    }

    RecordCheck {
        valid,
        invalid,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_churn_record() -> Value {
        json!({
            "tenure": 12,
            "MonthlyCharges": 29.85,
            "TotalCharges": 358.2,
            "Churn": "No",
            "InternetService": "DSL",
            "Contract": "One year",
            "PaymentMethod": "Mailed check",
            "MultipleLines": "No",
            "tenure_group": "Regular",
            "monthly_charge_segment": "Low",
            "has_internet_service": 1,
            "is_multi_line_user": 0,
            "contract_type_code": 1
        })
    }

    #[test]
    fn test_valid_churn_record() {
        assert!(validate_record(DatasetKind::Churn, &valid_churn_record()).is_ok());
    }

    #[test]
    fn test_churn_rejects_missing_band() {
        let mut record = valid_churn_record();
        record.as_object_mut().unwrap().remove("tenure_group");
        assert!(validate_record(DatasetKind::Churn, &record).is_err());
    }

    #[test]
    fn test_churn_rejects_unknown_label() {
        let mut record = valid_churn_record();
        record["tenure_group"] = json!("Veteran");
        let errors = validate_record(DatasetKind::Churn, &record).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_churn_rejects_missing_numeric() {
        let mut record = valid_churn_record();
        record["tenure"] = Value::Null;
        assert!(validate_record(DatasetKind::Churn, &record).is_err());
    }

    fn valid_air_record() -> Value {
        json!({
            "city": "delhi",
            "time": "2024-03-01T05:00:00",
            "pm10": 40.0,
            "pm2_5": 84.0,
            "carbon_monoxide": 1.2,
            "nitrogen_dioxide": 31.0,
            "sulphur_dioxide": 8.0,
            "ozone": 22.0,
            "uv_index": null,
            "aqi_category": "Moderate",
            "severity_score": 764.4,
            "risk_flag": "High Risk",
            "hour": 5
        })
    }

    #[test]
    fn test_valid_air_record() {
        assert!(validate_record(DatasetKind::AirQuality, &valid_air_record()).is_ok());
    }

    #[test]
    fn test_air_allows_propagated_nulls() {
        let mut record = valid_air_record();
        record["pm2_5"] = Value::Null;
        record["severity_score"] = Value::Null;
        record["risk_flag"] = Value::Null;
        record["aqi_category"] = Value::Null;
        assert!(validate_record(DatasetKind::AirQuality, &record).is_ok());
    }

    #[test]
    fn test_air_rejects_missing_city() {
        let mut record = valid_air_record();
        record.as_object_mut().unwrap().remove("city");
        assert!(validate_record(DatasetKind::AirQuality, &record).is_err());
    }

    #[test]
    fn test_check_records_counts() {
        let mut bad = valid_churn_record();
        bad["contract_type_code"] = json!(9);

        let check = check_records(&[valid_churn_record(), bad], DatasetKind::Churn);
        assert_eq!(check.valid, 1);
        assert_eq!(check.invalid, 1);
        assert_eq!(check.errors.len(), 1);
        assert_eq!(check.errors[0].0, 1);
    }
}
