//! Batched, retrying load stage.
//!
//! - Batch: fixed-size, order-preserving chunking
//! - Loader: per-chunk retry loop with partial-failure accounting
//! - Report: per-chunk outcomes aggregated into a run summary

pub mod batch;
pub mod loader;
pub mod report;

pub use batch::{batch, Chunk};
pub use loader::{coerce_for_store, LoadOptions, Loader};
pub use report::{failed_records, ChunkOutcome, ChunkStatus, LoadReport};
