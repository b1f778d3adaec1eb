//! Run-level errors

use std::path::PathBuf;

/// Errors that abort an ingestion run or its snapshot I/O
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Source directory missing or not listable
    #[error("Source directory {path}: {reason}")]
    SourceDir { path: PathBuf, reason: String },

    /// Glob pattern rejected
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Every discovered file was skipped or failed
    #[error("No valid source files in {path} ({discovered} discovered)")]
    NoValidSources { path: PathBuf, discovered: usize },

    /// Worker pool could not be built
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Snapshot could not be written or read
    #[error("Snapshot error at {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StagingError {
    pub(crate) fn snapshot(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        StagingError::Snapshot {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
