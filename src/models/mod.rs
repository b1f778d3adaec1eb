//! Models module
//!
//! Core data structures shared by the readers, transforms, merge and loader.

pub mod outcome;
pub mod record;
pub mod source;

pub use outcome::{DropReason, RecordOutcome, Recovery};
pub use record::{
    CANONICAL_KEY_FIELD, FlatRecord, INGEST_TIMESTAMP_FIELD, NormalizedRecord, RawRecord, Value,
};
pub use source::{FileOutcome, SkipReason, SourceFileDescriptor, SourceFormat};
