//! Ingestion runs: discover, read, normalize, merge and snapshot
//!
//! Per-file processing (format and encoding detection, reading, flattening,
//! normalization) runs on a rayon pool; the merge and snapshot stages run
//! after every file has been collected.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use unified_ingest::staging::{IngestOptions, ingest_to_snapshot};
//!
//! let output = ingest_to_snapshot(
//!     Path::new("data_raw"),
//!     Path::new("data_processed/master_dataset"),
//!     &IngestOptions::default(),
//! )?;
//! println!(
//!     "{} master records from {} files",
//!     output.summary.master_records, output.summary.files_read
//! );
//! # Ok::<(), unified_ingest::staging::StagingError>(())
//! ```

mod error;
pub mod ingest;
pub mod merge;
pub mod snapshot;
mod stats;

pub use error::StagingError;
pub use ingest::{
    FileResult, IngestOptions, IngestOutput, discover_files, ingest, ingest_to_snapshot,
    process_file,
};
pub use merge::{FileRecords, MasterRecordSet, MergeOutcome, merge};
pub use snapshot::{SNAPSHOT_FILE, read_snapshot, snapshot_files, write_snapshot};
pub use stats::RunSummary;
