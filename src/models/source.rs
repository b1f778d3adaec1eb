//! Source file descriptors and per-file outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Source format, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Delimited,
    JsonLines,
    Xml,
    Spreadsheet,
    SqlDump,
    Columnar,
}

impl SourceFormat {
    /// Whether the format is read as text (and so needs charset detection)
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            SourceFormat::Delimited
                | SourceFormat::JsonLines
                | SourceFormat::Xml
                | SourceFormat::SqlDump
        )
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Delimited => "delimited",
            SourceFormat::JsonLines => "json",
            SourceFormat::Xml => "xml",
            SourceFormat::Spreadsheet => "spreadsheet",
            SourceFormat::SqlDump => "sql",
            SourceFormat::Columnar => "parquet",
        };
        write!(f, "{}", name)
    }
}

/// Why a file was skipped without producing records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension not recognised
    Unsupported,
    /// Zero-length file, or no readable content
    Empty,
    /// Cheap structural check failed before parsing
    Preflight,
    /// Parsing failed for the whole file
    Corrupt,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipReason::Unsupported => "unsupported",
            SkipReason::Empty => "empty",
            SkipReason::Preflight => "preflight",
            SkipReason::Corrupt => "corrupt",
        };
        write!(f, "{}", name)
    }
}

/// Per-file outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum FileOutcome {
    Success,
    Skipped(SkipReason),
    ReadError(String),
}

/// Everything the run learned about one input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileDescriptor {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
    /// Encoding label as detected (`UTF-8`, `ISO-8859-1`, ...), text formats only
    pub encoding: Option<String>,
    pub outcome: FileOutcome,
    /// Human-readable detail for skips and errors
    pub message: Option<String>,
}

impl SourceFileDescriptor {
    pub fn new(path: PathBuf, format: Option<SourceFormat>) -> Self {
        Self {
            path,
            format,
            encoding: None,
            outcome: FileOutcome::Success,
            message: None,
        }
    }

    /// File name used by the merge tie-break
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
