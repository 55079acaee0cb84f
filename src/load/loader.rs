//! Chunked, retrying loader.
//!
//! Sends each chunk to the store as a single insert, retrying up to
//! `max_retries` additional times with a constant backoff. A chunk that
//! exhausts its budget is recorded as failed and the run moves on to the
//! next chunk: a run with some failed chunks still loads every succeedable
//! chunk and reports precisely which rows were lost.
//!
//! Delivery is at-least-once: a retry can re-send rows the remote already
//! committed before the response was lost. A uniqueness-violation response
//! is therefore treated as "already loaded" rather than a failure; the
//! remote table needs a natural-key unique constraint for that to make the
//! run exactly-once.

use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::batch::{batch, Chunk};
use super::report::{ChunkOutcome, LoadReport};
use crate::error::ConfigResult;
use crate::store::StoreTarget;
use crate::transform::canonical_timestamp;

/// Loader tuning values.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Records per chunk.
    pub batch_size: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Constant delay between attempts. Deliberately not exponential,
    /// which is a known robustness gap under sustained outages.
    pub retry_delay: Duration,
    /// Columns coerced to canonical timestamp text before transmission.
    pub timestamp_columns: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(crate::config::DEFAULT_RETRY_DELAY_MS),
            timestamp_columns: Vec::new(),
        }
    }
}

impl From<&crate::config::LoadSettings> for LoadOptions {
    fn from(settings: &crate::config::LoadSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
            timestamp_columns: Vec::new(),
        }
    }
}

/// Loads chunks into one table of a store.
///
/// The store is borrowed for the length of one run; tests pass a scripted
/// substitute.
pub struct Loader<'a, S: StoreTarget + ?Sized> {
    store: &'a S,
    table: String,
    options: LoadOptions,
}

impl<'a, S: StoreTarget + ?Sized> Loader<'a, S> {
    pub fn new(store: &'a S, table: impl Into<String>, options: LoadOptions) -> Self {
        Self {
            store,
            table: table.into(),
            options,
        }
    }

    /// Load one chunk, retrying per the options. Never mutates the chunk;
    /// the transmitted payload is a coerced copy.
    pub async fn load_chunk(&self, chunk: &Chunk<'_>) -> ChunkOutcome {
        let payload: Vec<Value> = chunk
            .records
            .iter()
            .map(|r| coerce_for_store(r, &self.options.timestamp_columns))
            .collect();

        let budget = self.options.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=budget {
            match self.store.insert(&self.table, &payload).await {
                Ok(()) => {
                    debug!(chunk = chunk.index, attempt, "chunk inserted");
                    return ChunkOutcome::succeeded(chunk, attempt);
                }
                Err(error) if error.is_unique_violation() => {
                    // The rows were committed by an earlier attempt whose
                    // response was lost.
                    debug!(chunk = chunk.index, attempt, "chunk already loaded");
                    return ChunkOutcome::succeeded(chunk, attempt);
                }
                Err(error) => {
                    warn!(
                        chunk = chunk.index,
                        attempt,
                        budget,
                        error = %error,
                        "chunk insert failed"
                    );
                    last_error = Some(error.to_string());
                    if attempt < budget && !self.options.retry_delay.is_zero() {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }

        ChunkOutcome::failed(chunk, budget, last_error)
    }

    /// Batch the records and load every chunk sequentially in partition
    /// order, assembling the report incrementally. Only a zero batch size
    /// fails; per-chunk errors are contained in the report.
    pub async fn load_all(&self, records: &[Value]) -> ConfigResult<LoadReport> {
        let chunks = batch(records, self.options.batch_size)?;
        let mut report = LoadReport::new(self.table.as_str(), records.len());

        for chunk in &chunks {
            let outcome = self.load_chunk(chunk).await;
            if outcome.is_success() {
                tracing::info!(
                    chunk = outcome.index,
                    rows = outcome.rows,
                    attempts = outcome.attempts,
                    "chunk loaded"
                );
            } else {
                warn!(
                    chunk = outcome.index,
                    rows = outcome.rows,
                    attempts = outcome.attempts,
                    "chunk failed after retries; continuing"
                );
            }
            report.push(outcome);
        }

        Ok(report)
    }
}

/// Coerce one record for transmission: empty-string and NaN markers become
/// JSON null, declared timestamp columns become canonical text. This is
/// the only per-record work the loader performs, and it is idempotent:
/// coercing an already-coerced record is a no-op.
pub fn coerce_for_store(record: &Value, timestamp_columns: &[String]) -> Value {
    let Some(obj) = record.as_object() else {
        return record.clone();
    };

    let mut coerced = Map::with_capacity(obj.len());
    for (key, value) in obj {
        let wire_value = match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                    Value::Null
                } else if timestamp_columns.iter().any(|c| c == key) {
                    match canonical_timestamp(trimmed) {
                        Some(canonical) => Value::String(canonical),
                        None => value.clone(),
                    }
                } else {
                    value.clone()
                }
            }
            Value::Number(n) => match n.as_f64() {
                Some(f) if !f.is_finite() => Value::Null,
                _ => value.clone(),
            },
            _ => value.clone(),
        };
        coerced.insert(key.clone(), wire_value);
    }
    Value::Object(coerced)
}
