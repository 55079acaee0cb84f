//! Feature-engineering transform stage.
//!
//! - Spec: declarative description of one dataset's derivations
//! - Executor: pure application of a spec to raw records

pub mod executor;
pub mod spec;

pub use executor::{canonical_timestamp, parse_timestamp, transform, SkippedRecord, TransformOutcome};
pub use spec::{
    BandSpec, CodeMap, DatasetKind, FillPolicy, MissingInputPolicy, NumericColumn, ScoreSpec,
    TimestampSpec, TransformSpec, WeightedInput,
};
