//! Error types for the stageload pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - missing or invalid configuration
//! - [`ShapeError`] - unrecognized sensor document shapes
//! - [`TransformError`] - invalid transform specs
//! - [`StoreError`] - remote store transport and application errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Configuration errors abort before any work begins. Store errors are
//! contained to the chunk that observed them and recorded in the chunk's
//! outcome. Shape errors are contained to the offending document.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the environment-supplied configuration.
///
/// These are fatal: they abort a run before any load attempt is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// An environment variable is present but does not parse.
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Batch size must be a positive integer.
    #[error("Batch size must be a positive integer, got {0}")]
    InvalidBatchSize(usize),
}

// =============================================================================
// Sensor Document Shape Errors
// =============================================================================

/// Errors while normalizing a raw sensor document.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// The document matches neither recognized payload shape.
    #[error("Document matches no recognized sensor payload shape")]
    UnrecognizedShape,

    /// The document is not valid JSON.
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document could not be read.
    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Transform Spec Errors
// =============================================================================

/// Errors raised when a transform spec is internally inconsistent.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A band needs exactly one more label than it has boundaries.
    #[error("Band '{target}' has {boundaries} boundaries but {labels} labels (need boundaries + 1)")]
    BandArity {
        target: String,
        boundaries: usize,
        labels: usize,
    },

    /// Band boundaries must be strictly increasing.
    #[error("Band '{target}' boundaries must be strictly increasing")]
    BandOrder { target: String },

    /// Composite score weights must be positive.
    #[error("Score weight for '{column}' must be positive, got {weight}")]
    NonPositiveWeight { column: String, weight: f64 },

    /// The spec JSON does not deserialize.
    #[error("Invalid transform spec: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Remote Store Errors
// =============================================================================

/// Errors from the remote store client.
///
/// The remote API may report success at the transport layer while encoding
/// a semantic failure in the body; both surfaces map into this type so the
/// loader can treat them uniformly.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or call failure before a usable response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered but the response encodes an application error.
    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },

    /// The response body could not be interpreted.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

/// Postgres error code for a unique-constraint violation.
const UNIQUE_VIOLATION_CODE: &str = "23505";

impl StoreError {
    /// Whether this error is a uniqueness violation, i.e. the rows were
    /// already committed by an earlier attempt. The loader treats this as
    /// success-equivalent instead of retrying the insert.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::Remote { code, .. } if code == UNIQUE_VIOLATION_CODE)
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::pipeline::run`]. It
/// wraps all lower-level errors and adds pipeline-specific variants. Note
/// that per-chunk store failures do NOT surface here: they are recorded in
/// the [`crate::load::LoadReport`] and the run continues.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] crate::parser::CsvError),

    /// Sensor document shape error.
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Transform spec error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Store error outside the per-chunk retry loop.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No records to process.
    #[error("No records to process")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for sensor document normalization.
pub type ShapeResult<T> = Result<T, ShapeError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
