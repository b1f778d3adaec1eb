//! Unified ingestion pipeline for heterogeneous record sources
//!
//! Provides:
//! - Format and character-encoding detection
//! - Source readers for delimited text, JSON/JSONL, XML, spreadsheets, SQL dumps and Parquet
//! - Data-quality repair, flattening, field normalization and canonical keys
//! - Deterministic merge and deduplication into a master record set
//! - A schema-evolving, batch-tolerant loader for an analytical store

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod database;
pub mod import;
pub mod logging;
pub mod models;
pub mod staging;
pub mod transform;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigError, PipelineConfig, StoreBackendType};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDbStore;
pub use database::{
    AddColumnOutcome, ColumnType, LoadReport, RecordStore, StoreError, StoreLoader, StoreResult,
};
pub use import::{ReadError, SourceReader, detect_format};
pub use models::{
    FileOutcome, FlatRecord, NormalizedRecord, RawRecord, RecordOutcome, SourceFileDescriptor,
    SourceFormat, Value,
};
pub use staging::{
    IngestOptions, IngestOutput, MasterRecordSet, RunSummary, StagingError, ingest,
    ingest_to_snapshot,
};
pub use transform::{canonical_key, flatten, normalize_field_name};
