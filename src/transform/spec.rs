//! Transform spec definition.
//!
//! A spec declares how one dataset's raw records become enriched records:
//! which columns are numeric and how their missing values are filled, how
//! continuous values map into named bands, how category values map into
//! integer codes, how a composite score is combined, and which identifying
//! columns are dropped before load. Bucketing rules are configuration
//! data: the built-in presets cover the two shipped datasets, and a spec
//! can equally be loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TransformError;

/// Missing-value policy for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave missing values missing.
    #[default]
    None,
    /// Substitute the column's median over the whole input batch.
    Median,
}

/// A column coerced to numeric before derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    #[serde(default)]
    pub fill: FillPolicy,
}

impl NumericColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fill: FillPolicy::None,
        }
    }

    pub fn median_filled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fill: FillPolicy::Median,
        }
    }
}

/// A monotonic set of half-open intervals mapping a continuous column to
/// band labels. The lower edge is inclusive, the upper edge exclusive, and
/// the final band is unbounded above: with boundaries `[12, 36, 60]` and
/// labels `[New, Regular, Loyal, Champion]`, the value 12 lands in
/// `Regular` and 11 in `New`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSpec {
    /// Column the band reads; may be a derived column produced earlier in
    /// the spec (e.g. a composite score).
    pub source: String,
    /// Column the label is written to.
    pub target: String,
    /// Strictly increasing interval boundaries.
    pub boundaries: Vec<f64>,
    /// One label per interval: `boundaries.len() + 1` entries.
    pub labels: Vec<String>,
}

/// A finite category-value to integer-code mapping. A value outside the
/// known set (including a missing value) yields the fallback: either a
/// constant code or null. Never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMap {
    pub source: String,
    pub target: String,
    pub map: BTreeMap<String, i64>,
    #[serde(default)]
    pub fallback: Option<i64>,
}

/// Policy for a composite score whose inputs are partially missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingInputPolicy {
    /// Any missing input yields a null score (and null dependent bands).
    #[default]
    Propagate,
    /// Missing inputs contribute zero.
    ZeroFill,
}

/// One weighted input of a composite score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedInput {
    pub column: String,
    pub weight: f64,
}

/// A positive-weighted linear combination of numeric columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSpec {
    pub target: String,
    pub weights: Vec<WeightedInput>,
    #[serde(default)]
    pub missing: MissingInputPolicy,
}

/// Timestamp handling: the column is canonicalized to `YYYY-MM-DDTHH:MM:SS`
/// text and an hour-of-day column is derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampSpec {
    pub column: String,
    #[serde(default = "default_hour_target")]
    pub hour_target: String,
}

fn default_hour_target() -> String {
    "hour".to_string()
}

/// The datasets this pipeline ships presets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Churn,
    AirQuality,
}

impl DatasetKind {
    /// The built-in transform spec for this dataset.
    pub fn spec(self) -> TransformSpec {
        match self {
            DatasetKind::Churn => TransformSpec::churn(),
            DatasetKind::AirQuality => TransformSpec::air_quality(),
        }
    }

    /// Default target table name for this dataset.
    pub fn default_table(self) -> &'static str {
        match self {
            DatasetKind::Churn => "telco_customer_data",
            DatasetKind::AirQuality => "air_quality_data",
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A complete transform spec for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Version of the spec format.
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Columns coerced to numeric, with their fill policy.
    #[serde(default)]
    pub numeric: Vec<NumericColumn>,

    /// Sentinel substituted into missing non-numeric columns, if any.
    #[serde(default)]
    pub categorical_fill: Option<String>,

    /// A record is dropped when every listed column is missing after
    /// coercion. Empty list keeps every record.
    #[serde(default)]
    pub require_any_of: Vec<String>,

    /// Composite score, computed before bands so bands may read it.
    #[serde(default)]
    pub score: Option<ScoreSpec>,

    /// Band derivations, applied in order.
    #[serde(default)]
    pub bands: Vec<BandSpec>,

    /// Integer-code derivations.
    #[serde(default)]
    pub codes: Vec<CodeMap>,

    /// Timestamp canonicalization and hour derivation.
    #[serde(default)]
    pub timestamp: Option<TimestampSpec>,

    /// Identifying / non-predictive columns dropped from the output.
    #[serde(default)]
    pub drop: Vec<String>,
}

impl TransformSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            numeric: Vec::new(),
            categorical_fill: None,
            require_any_of: Vec::new(),
            score: None,
            bands: Vec::new(),
            codes: Vec::new(),
            timestamp: None,
            drop: Vec::new(),
        }
    }

    /// Parse a spec from JSON text.
    pub fn from_json(json: &str) -> Result<Self, TransformError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, TransformError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency: band arity and ordering, score weights.
    pub fn check(&self) -> Result<(), TransformError> {
        for band in &self.bands {
            if band.labels.len() != band.boundaries.len() + 1 {
                return Err(TransformError::BandArity {
                    target: band.target.clone(),
                    boundaries: band.boundaries.len(),
                    labels: band.labels.len(),
                });
            }
            if band.boundaries.windows(2).any(|w| w[0] >= w[1]) {
                return Err(TransformError::BandOrder {
                    target: band.target.clone(),
                });
            }
        }
        if let Some(score) = &self.score {
            for input in &score.weights {
                if input.weight <= 0.0 {
                    return Err(TransformError::NonPositiveWeight {
                        column: input.column.clone(),
                        weight: input.weight,
                    });
                }
            }
        }
        Ok(())
    }

    /// Columns derived by this spec, in derivation order.
    pub fn derived_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if let Some(score) = &self.score {
            columns.push(score.target.clone());
        }
        for band in &self.bands {
            columns.push(band.target.clone());
        }
        for code in &self.codes {
            columns.push(code.target.clone());
        }
        if let Some(ts) = &self.timestamp {
            columns.push(ts.hour_target.clone());
        }
        columns
    }

    /// Output column order for a given input header order: the input
    /// columns minus the dropped ones, then the derived columns.
    pub fn output_columns(&self, input_headers: &[String]) -> Vec<String> {
        let mut columns: Vec<String> = input_headers
            .iter()
            .filter(|h| !self.drop.contains(h))
            .cloned()
            .collect();
        for derived in self.derived_columns() {
            if !columns.contains(&derived) {
                columns.push(derived);
            }
        }
        columns
    }

    /// Spec for the telco customer churn dataset.
    pub fn churn() -> Self {
        let mut spec = Self::new();
        spec.description = "Telco customer churn feature derivation".to_string();

        spec.numeric = vec![
            NumericColumn::median_filled("tenure"),
            NumericColumn::median_filled("MonthlyCharges"),
            NumericColumn::median_filled("TotalCharges"),
        ];
        spec.categorical_fill = Some("Unknown".to_string());

        spec.bands = vec![
            BandSpec {
                source: "tenure".to_string(),
                target: "tenure_group".to_string(),
                boundaries: vec![12.0, 36.0, 60.0],
                labels: labels(&["New", "Regular", "Loyal", "Champion"]),
            },
            BandSpec {
                source: "MonthlyCharges".to_string(),
                target: "monthly_charge_segment".to_string(),
                boundaries: vec![30.0, 70.0],
                labels: labels(&["Low", "Medium", "High"]),
            },
        ];

        spec.codes = vec![
            CodeMap {
                source: "InternetService".to_string(),
                target: "has_internet_service".to_string(),
                map: codes(&[("DSL", 1), ("Fiber optic", 1), ("No", 0)]),
                fallback: None,
            },
            CodeMap {
                source: "MultipleLines".to_string(),
                target: "is_multi_line_user".to_string(),
                map: codes(&[("Yes", 1)]),
                fallback: Some(0),
            },
            CodeMap {
                source: "Contract".to_string(),
                target: "contract_type_code".to_string(),
                map: codes(&[("Month-to-month", 0), ("One year", 1), ("Two year", 2)]),
                fallback: None,
            },
        ];

        spec.drop = vec!["customerID".to_string(), "gender".to_string()];
        spec
    }

    /// Spec for the city air-quality sensor dataset.
    pub fn air_quality() -> Self {
        let mut spec = Self::new();
        spec.description = "City air-quality severity derivation".to_string();

        spec.numeric = vec![
            NumericColumn::new("pm10"),
            NumericColumn::new("pm2_5"),
            NumericColumn::new("carbon_monoxide"),
            NumericColumn::new("nitrogen_dioxide"),
            NumericColumn::new("sulphur_dioxide"),
            NumericColumn::new("ozone"),
            NumericColumn::new("uv_index"),
        ];
        spec.require_any_of = vec![
            "pm10".to_string(),
            "pm2_5".to_string(),
            "carbon_monoxide".to_string(),
            "nitrogen_dioxide".to_string(),
            "sulphur_dioxide".to_string(),
            "ozone".to_string(),
        ];

        spec.score = Some(ScoreSpec {
            target: "severity_score".to_string(),
            weights: vec![
                WeightedInput { column: "pm2_5".to_string(), weight: 5.0 },
                WeightedInput { column: "pm10".to_string(), weight: 3.0 },
                WeightedInput { column: "nitrogen_dioxide".to_string(), weight: 4.0 },
                WeightedInput { column: "sulphur_dioxide".to_string(), weight: 4.0 },
                WeightedInput { column: "carbon_monoxide".to_string(), weight: 2.0 },
                WeightedInput { column: "ozone".to_string(), weight: 3.0 },
            ],
            missing: MissingInputPolicy::Propagate,
        });

        spec.bands = vec![
            BandSpec {
                source: "pm2_5".to_string(),
                target: "aqi_category".to_string(),
                boundaries: vec![50.0, 100.0, 200.0, 300.0],
                labels: labels(&["Good", "Moderate", "Unhealthy", "Very Unhealthy", "Hazardous"]),
            },
            BandSpec {
                source: "severity_score".to_string(),
                target: "risk_flag".to_string(),
                boundaries: vec![200.0, 400.0],
                labels: labels(&["Low Risk", "Moderate Risk", "High Risk"]),
            },
        ];

        spec.timestamp = Some(TimestampSpec {
            column: "time".to_string(),
            hour_target: "hour".to_string(),
        });

        spec
    }
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self::new()
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn codes(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}
