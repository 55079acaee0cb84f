//! Per-chunk outcomes and the run-level load report.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Range;
use uuid::Uuid;

use super::batch::Chunk;

/// Terminal status of one chunk's load attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkStatus {
    Succeeded,
    FailedAfterRetries,
}

/// The outcome of one chunk, created once its attempts are exhausted and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkOutcome {
    /// Chunk index in partition order.
    pub index: usize,
    /// Index of the chunk's first record in the run's input.
    pub start_row: usize,
    /// Number of records in the chunk.
    pub rows: usize,
    /// Attempts actually made (1 on first-try success).
    pub attempts: u32,
    pub status: ChunkStatus,
    /// Last observed error for a failed chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ChunkOutcome {
    pub(crate) fn succeeded(chunk: &Chunk<'_>, attempts: u32) -> Self {
        Self {
            index: chunk.index,
            start_row: chunk.start_row,
            rows: chunk.len(),
            attempts,
            status: ChunkStatus::Succeeded,
            last_error: None,
        }
    }

    pub(crate) fn failed(chunk: &Chunk<'_>, attempts: u32, last_error: Option<String>) -> Self {
        Self {
            index: chunk.index,
            start_row: chunk.start_row,
            rows: chunk.len(),
            attempts,
            status: ChunkStatus::FailedAfterRetries,
            last_error,
        }
    }

    /// The input row range this outcome covers.
    pub fn row_range(&self) -> Range<usize> {
        self.start_row..self.start_row + self.rows
    }

    pub fn is_success(&self) -> bool {
        self.status == ChunkStatus::Succeeded
    }
}

/// Aggregated outcome of one load run.
///
/// Assembled incrementally, in chunk order, by the orchestrating run; one
/// outcome slot per chunk, written exactly once. Never mutated after the
/// run completes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// Target table.
    pub table: String,
    /// Rows handed to the batcher.
    pub total_rows: usize,
    /// Per-chunk outcomes in partition order.
    pub outcomes: Vec<ChunkOutcome>,
}

impl LoadReport {
    pub fn new(table: impl Into<String>, total_rows: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            table: table.into(),
            total_rows,
            outcomes: Vec::new(),
        }
    }

    /// Record a chunk's outcome. Outcomes arrive in chunk order.
    pub fn push(&mut self, outcome: ChunkOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn chunks_attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.rows)
            .sum()
    }

    pub fn failed_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.rows)
            .sum()
    }

    /// Indices of the chunks that failed after retries.
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.index)
            .collect()
    }

    /// Input row ranges that never committed; a partial reload targets
    /// exactly these.
    pub fn failed_row_ranges(&self) -> Vec<Range<usize>> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(ChunkOutcome::row_range)
            .collect()
    }

    /// Whether every attempted row committed.
    pub fn is_complete(&self) -> bool {
        self.failed_rows() == 0
    }

    /// Metric-name to value rows for the run summary table.
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let failed = self.failed_chunks();
        let failed_list = if failed.is_empty() {
            "none".to_string()
        } else {
            failed
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        vec![
            ("run id".to_string(), self.run_id.to_string()),
            ("table".to_string(), self.table.clone()),
            ("rows attempted".to_string(), self.total_rows.to_string()),
            ("rows succeeded".to_string(), self.succeeded_rows().to_string()),
            ("rows failed".to_string(), self.failed_rows().to_string()),
            ("chunks attempted".to_string(), self.chunks_attempted().to_string()),
            ("failed chunks".to_string(), failed_list),
        ]
    }

    /// Serialize the report as a JSON artifact.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The rows a report says were lost, extracted from the original input.
/// Useful for writing a retry file covering only the failed ranges.
pub fn failed_records<'a>(report: &LoadReport, records: &'a [Value]) -> Vec<&'a Value> {
    report
        .failed_row_ranges()
        .into_iter()
        .flat_map(|range| records[range.start.min(records.len())..range.end.min(records.len())].iter())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::batch::batch;
    use serde_json::json;

    fn outcome(index: usize, start: usize, rows: usize, ok: bool) -> ChunkOutcome {
        ChunkOutcome {
            index,
            start_row: start,
            rows,
            attempts: 1,
            status: if ok {
                ChunkStatus::Succeeded
            } else {
                ChunkStatus::FailedAfterRetries
            },
            last_error: if ok { None } else { Some("boom".into()) },
        }
    }

    #[test]
    fn test_totals_add_up() {
        let mut report = LoadReport::new("t", 500);
        report.push(outcome(0, 0, 200, true));
        report.push(outcome(1, 200, 200, false));
        report.push(outcome(2, 400, 100, true));

        assert_eq!(report.succeeded_rows(), 300);
        assert_eq!(report.failed_rows(), 200);
        assert_eq!(report.succeeded_rows() + report.failed_rows(), report.total_rows);
        assert_eq!(report.failed_chunks(), vec![1]);
        assert_eq!(report.failed_row_ranges(), vec![200..400]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_complete_run() {
        let mut report = LoadReport::new("t", 10);
        report.push(outcome(0, 0, 10, true));
        assert!(report.is_complete());
        assert!(report.failed_chunks().is_empty());
    }

    #[test]
    fn test_failed_records_extraction() {
        let records: Vec<Value> = (0..10).map(|i| json!({"row": i})).collect();
        let chunks = batch(&records, 4).unwrap();

        let mut report = LoadReport::new("t", records.len());
        report.push(ChunkOutcome::succeeded(&chunks[0], 1));
        report.push(ChunkOutcome::failed(&chunks[1], 3, Some("boom".into())));
        report.push(ChunkOutcome::succeeded(&chunks[2], 1));

        let lost = failed_records(&report, &records);
        let lost_rows: Vec<i64> = lost.iter().map(|r| r["row"].as_i64().unwrap()).collect();
        assert_eq!(lost_rows, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_summary_rows() {
        let mut report = LoadReport::new("air_quality_data", 50);
        report.push(outcome(0, 0, 50, true));

        let rows = report.summary_rows();
        let lookup = |name: &str| {
            rows.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(lookup("table"), "air_quality_data");
        assert_eq!(lookup("rows succeeded"), "50");
        assert_eq!(lookup("failed chunks"), "none");
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let mut report = LoadReport::new("t", 1);
        report.push(outcome(0, 0, 1, false));
        let json = report.to_json().unwrap();
        assert!(json.contains("runId"));
        assert!(json.contains("totalRows"));
        assert!(json.contains("failedAfterRetries"));
        assert!(json.contains("lastError"));
    }
}
