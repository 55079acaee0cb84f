//! High-level run orchestration.
//!
//! Sequences the stages over one dataset: transform, record-level schema
//! check, batched load, and an optional read-back validation. The store
//! client is constructed by the caller and passed by reference, living
//! exactly as long as the run.
//!
//! Partial failure is first-class: chunk-level store errors never abort
//! the run, and the run always produces a [`LoadReport`] once
//! configuration has been accepted.

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::load::{LoadOptions, Loader};
use crate::load::LoadReport;
use crate::store::StoreTarget;
use crate::transform::{transform, DatasetKind, TransformSpec};
use crate::validation::{check_records, validate_readback, CheckSpec, ValidationReport};

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Transform rules for this dataset.
    pub spec: TransformSpec,
    /// Which built-in dataset the records belong to, when known; enables
    /// the record-level schema check.
    pub kind: Option<DatasetKind>,
    /// Target table.
    pub table: String,
    /// Loader tuning.
    pub load: LoadOptions,
    /// Skip the post-load read-back comparison.
    pub skip_readback: bool,
}

impl RunOptions {
    /// Options for a built-in dataset with its default table.
    pub fn for_dataset(kind: DatasetKind) -> Self {
        Self {
            spec: kind.spec(),
            kind: Some(kind),
            table: kind.default_table().to_string(),
            load: LoadOptions::default(),
            skip_readback: false,
        }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// The enriched reference set, as authored before loading.
    pub enriched: Vec<Value>,
    /// Records dropped by the transform validity filter.
    pub skipped: usize,
    /// Records passing the schema check.
    pub valid_records: usize,
    /// Records failing the schema check (loaded regardless, but reported).
    pub invalid_records: usize,
    /// Per-chunk load accounting.
    pub report: LoadReport,
    /// Read-back diff, when performed.
    pub validation: Option<ValidationReport>,
}

/// Run the pipeline over raw records.
pub async fn run<S: StoreTarget + ?Sized>(
    records: &[Value],
    store: &S,
    options: &RunOptions,
) -> PipelineResult<RunOutcome> {
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    // Transform.
    info!(records = records.len(), "transforming");
    let outcome = transform(records, &options.spec)?;
    if !outcome.skipped.is_empty() {
        warn!(skipped = outcome.skipped.len(), "records dropped by validity filter");
        for skip in outcome.skipped.iter().take(3) {
            warn!(row = skip.row, reason = %skip.reason, "skipped record");
        }
    }
    for (column, median) in &outcome.medians {
        info!(column = %column, median, "median substituted for missing values");
    }

    // Record-level schema check.
    let (valid_records, invalid_records) = match options.kind {
        Some(kind) => {
            let check = check_records(&outcome.records, kind);
            if check.invalid > 0 {
                warn!(invalid = check.invalid, "records failed the schema check");
                for (row, errors) in check.errors.iter().take(3) {
                    warn!(row, errors = %errors.join("; "), "invalid record");
                }
            }
            (check.valid, check.invalid)
        }
        None => (outcome.records.len(), 0),
    };

    // Load, chunk by chunk.
    let mut load_options = options.load.clone();
    if let Some(ts) = &options.spec.timestamp {
        if !load_options.timestamp_columns.contains(&ts.column) {
            load_options.timestamp_columns.push(ts.column.clone());
        }
    }
    let loader = Loader::new(store, options.table.as_str(), load_options);
    let report = loader.load_all(&outcome.records).await?;
    info!(
        succeeded = report.succeeded_rows(),
        failed = report.failed_rows(),
        chunks = report.chunks_attempted(),
        "load finished"
    );

    // Read back and diff.
    let validation = if options.skip_readback {
        None
    } else {
        match store.select_all(&options.table).await {
            Ok(readback) => {
                let checks = CheckSpec::from_transform(&options.spec);
                Some(validate_readback(&outcome.records, &readback, &checks))
            }
            Err(error) => {
                // The load accounting stands on its own; a failed read-back
                // only costs the diff.
                warn!(error = %error, "read-back failed; skipping validation");
                None
            }
        }
    };

    Ok(RunOutcome {
        enriched: outcome.records,
        skipped: outcome.skipped.len(),
        valid_records,
        invalid_records,
        report,
        validation,
    })
}
