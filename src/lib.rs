//! # Stageload - batched, retrying bulk-load pipeline
//!
//! Stageload ingests tabular and time-series records (customer churn
//! exports, city air-quality sensor documents), applies deterministic
//! feature-engineering transforms, and bulk-loads the enriched result into
//! a hosted relational store, followed by a read-back validation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌──────────┐    ┌─────────────┐
//! │ CSV / JSON  │───▶│  Transform  │───▶│  Batch   │───▶│   Loader    │
//! │  documents  │    │ (fill+bin)  │    │ (chunks) │    │ (retrying)  │
//! └─────────────┘    └─────────────┘    └──────────┘    └──────┬──────┘
//!                                                              │
//!                            ┌─────────────┐    ┌──────────────▼──────┐
//!                            │  Validator  │◀───│ LoadReport + store  │
//!                            │ (readback)  │    │      read-back      │
//!                            └─────────────┘    └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stageload::{pipeline, Config, DatasetKind, RunOptions, StoreClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = StoreClient::new(&config.store)?;
//!     let records = stageload::parser::read_file("data/staged/churn.csv")?.records;
//!
//!     let outcome = pipeline::run(
//!         &records,
//!         &store,
//!         &RunOptions::for_dataset(DatasetKind::Churn),
//!     )
//!     .await?;
//!     println!("loaded {} rows", outcome.report.succeeded_rows());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - hierarchical error types
//! - [`config`] - environment-supplied configuration
//! - [`parser`] - delimited-text and sensor-document input
//! - [`transform`] - declarative specs and the pure executor
//! - [`load`] - batching, retrying loader, load report
//! - [`store`] - remote store client and the [`store::StoreTarget`] seam
//! - [`validation`] - schema checks and the read-back diff
//! - [`pipeline`] - run orchestration

// Core modules
pub mod config;
pub mod error;

// Input
pub mod parser;

// Transformation
pub mod transform;

// Loading
pub mod load;

// Remote store
pub mod store;

// Validation
pub mod validation;

// Orchestration
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, PipelineError, PipelineResult, ShapeError, StoreError, TransformError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{Config, LoadSettings, StoreConfig};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{read_bytes, read_file, write_file, CsvError, Dataset};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    transform, DatasetKind, MissingInputPolicy, TransformOutcome, TransformSpec,
};

// =============================================================================
// Re-exports - Load
// =============================================================================

pub use load::{batch, Chunk, ChunkOutcome, ChunkStatus, LoadOptions, LoadReport, Loader};

// =============================================================================
// Re-exports - Store
// =============================================================================

pub use store::{StoreClient, StoreTarget};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate_readback, CheckSpec, ValidationReport};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{run, RunOptions, RunOutcome};
