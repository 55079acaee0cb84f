//! Downstream validation.
//!
//! Two layers:
//!
//! - [`schema`] checks individual enriched records against embedded JSON
//!   Schemas before load.
//! - The readback validator in this module compares the reference enriched
//!   set against a full read-back of the remote table after load, to
//!   detect loss. It is a pure comparison: it reports, never corrects.
//!
//! Findings are structured data surfaced to the operator, not errors.

pub mod schema;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::transform::spec::{FillPolicy, TransformSpec};

pub use schema::{check_records, is_valid, schema_for, validate, validate_record, RecordCheck};

// =============================================================================
// Check Spec
// =============================================================================

/// Expected band labels for one column.
#[derive(Debug, Clone)]
pub struct BandCheckSpec {
    pub column: String,
    pub expected: Vec<String>,
}

/// Legal integer codes for one column.
#[derive(Debug, Clone)]
pub struct CodeCheckSpec {
    pub column: String,
    pub legal: Vec<i64>,
}

/// What the readback validator checks for one dataset.
#[derive(Debug, Clone, Default)]
pub struct CheckSpec {
    /// Columns that must carry no nulls after the missing-value policy.
    pub required_non_null: Vec<String>,
    pub bands: Vec<BandCheckSpec>,
    pub codes: Vec<CodeCheckSpec>,
}

impl CheckSpec {
    /// Derive the checks from a transform spec: median-filled columns must
    /// be non-null, every band label is expected to appear, and code
    /// columns may only carry their declared codes.
    pub fn from_transform(spec: &TransformSpec) -> Self {
        let required_non_null = spec
            .numeric
            .iter()
            .filter(|c| c.fill == FillPolicy::Median)
            .map(|c| c.name.clone())
            .collect();

        let bands = spec
            .bands
            .iter()
            .map(|b| BandCheckSpec {
                column: b.target.clone(),
                expected: b.labels.clone(),
            })
            .collect();

        let codes = spec
            .codes
            .iter()
            .map(|c| {
                let mut legal: Vec<i64> = c.map.values().copied().collect();
                if let Some(fallback) = c.fallback {
                    legal.push(fallback);
                }
                legal.sort_unstable();
                legal.dedup();
                CodeCheckSpec {
                    column: c.target.clone(),
                    legal,
                }
            })
            .collect();

        Self {
            required_non_null,
            bands,
            codes,
        }
    }
}

// =============================================================================
// Validation Report
// =============================================================================

/// Row-count comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCountCheck {
    pub reference: usize,
    pub store: usize,
}

impl RowCountCheck {
    pub fn matches(&self) -> bool {
        self.reference == self.store
    }
}

/// Per-column null-count comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NullCountCheck {
    pub column: String,
    pub reference_nulls: usize,
    pub store_nulls: usize,
}

impl NullCountCheck {
    pub fn matches(&self) -> bool {
        self.reference_nulls == self.store_nulls
    }
}

/// Which expected band labels actually appear in the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandPresenceCheck {
    pub column: String,
    pub expected: Vec<String>,
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

/// Which observed codes fall outside the declared legal set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSetCheck {
    pub column: String,
    pub legal: Vec<i64>,
    pub illegal: Vec<i64>,
}

/// Structural diff between the reference enriched set and the persisted
/// table. Never auto-corrected; surfaced to the operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub rows: RowCountCheck,
    pub nulls: Vec<NullCountCheck>,
    pub bands: Vec<BandPresenceCheck>,
    pub codes: Vec<CodeSetCheck>,
}

impl ValidationReport {
    /// Human-readable findings; empty when the diff is clean.
    pub fn findings(&self) -> Vec<String> {
        let mut findings = Vec::new();

        if !self.rows.matches() {
            findings.push(format!(
                "row count mismatch: reference {}, store {}",
                self.rows.reference, self.rows.store
            ));
        }
        for null in &self.nulls {
            if !null.matches() {
                findings.push(format!(
                    "null count mismatch in '{}': reference {}, store {}",
                    null.column, null.reference_nulls, null.store_nulls
                ));
            }
        }
        for band in &self.bands {
            if !band.missing.is_empty() {
                findings.push(format!(
                    "missing expected labels in '{}': {}",
                    band.column,
                    band.missing.join(", ")
                ));
            }
        }
        for code in &self.codes {
            if !code.illegal.is_empty() {
                findings.push(format!(
                    "illegal codes in '{}': {}",
                    code.column,
                    code.illegal
                        .iter()
                        .map(i64::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        findings
    }

    pub fn is_clean(&self) -> bool {
        self.findings().is_empty()
    }

    /// Metric-name to value rows for the validation summary table.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let findings = self.findings();
        let mut rows = vec![
            ("rows (reference)".to_string(), self.rows.reference.to_string()),
            ("rows (store)".to_string(), self.rows.store.to_string()),
            (
                "result".to_string(),
                if findings.is_empty() {
                    "clean".to_string()
                } else {
                    format!("{} finding(s)", findings.len())
                },
            ),
        ];
        for (i, finding) in findings.iter().enumerate() {
            rows.push((format!("finding {}", i + 1), finding.clone()));
        }
        rows
    }
}

/// Compare the reference enriched set against a table read-back.
pub fn validate_readback(
    reference: &[Value],
    readback: &[Value],
    checks: &CheckSpec,
) -> ValidationReport {
    let rows = RowCountCheck {
        reference: reference.len(),
        store: readback.len(),
    };

    let nulls = checks
        .required_non_null
        .iter()
        .map(|column| NullCountCheck {
            column: column.clone(),
            reference_nulls: null_count(reference, column),
            store_nulls: null_count(readback, column),
        })
        .collect();

    let bands = checks
        .bands
        .iter()
        .map(|band| {
            let present: BTreeSet<String> = readback
                .iter()
                .filter_map(|r| r.get(&band.column))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            let missing: Vec<String> = band
                .expected
                .iter()
                .filter(|label| !present.contains(*label))
                .cloned()
                .collect();
            BandPresenceCheck {
                column: band.column.clone(),
                expected: band.expected.clone(),
                present: present.into_iter().collect(),
                missing,
            }
        })
        .collect();

    let codes = checks
        .codes
        .iter()
        .map(|code| {
            let observed: BTreeSet<i64> = readback
                .iter()
                .filter_map(|r| r.get(&code.column))
                .filter_map(Value::as_i64)
                .collect();
            let illegal: Vec<i64> = observed
                .into_iter()
                .filter(|c| !code.legal.contains(c))
                .collect();
            CodeSetCheck {
                column: code.column.clone(),
                legal: code.legal.clone(),
                illegal,
            }
        })
        .collect();

    ValidationReport {
        rows,
        nulls,
        bands,
        codes,
    }
}

/// Missing means absent, JSON null, or a blank string.
fn null_count(records: &[Value], column: &str) -> usize {
    records
        .iter()
        .filter(|r| match r.get(column) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            _ => false,
        })
        .count()
}
