//! Import functionality
//!
//! Provides source readers for every supported input format:
//! - Delimited text (CSV/TSV, delimiter sniffing, positional row recovery)
//! - JSON documents and JSON Lines (line repair)
//! - XML (one record per child of the root)
//! - Spreadsheets (every sheet, first row as header)
//! - SQL dumps (`INSERT INTO ... VALUES` statements)
//! - Parquet
//!
//! Every reader implements [`SourceReader`] and reports one [`RecordOutcome`]
//! per unit it looked at, so callers can count what was parsed, recovered and
//! dropped.

pub mod columnar;
pub mod delimited;
pub mod encoding;
pub mod json;
pub mod spreadsheet;
pub mod sql_dump;
pub mod xml;

use std::path::Path;

pub use columnar::ColumnarReader;
pub use delimited::DelimitedReader;
pub use encoding::{SourceEncoding, detect_encoding};
pub use json::JsonReader;
pub use spreadsheet::SpreadsheetReader;
pub use sql_dump::SqlDumpReader;
pub use xml::XmlReader;

use crate::models::{RecordOutcome, SkipReason, SourceFormat};

/// Error reading a source file as a whole
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Pre-flight check failed: {0}")]
    Preflight(String),
    #[error("No readable content")]
    Empty,
    #[error("Corrupt source: {0}")]
    Corrupt(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ReadError {
    /// Skip classification, or `None` when the error is a read failure
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ReadError::Preflight(_) => Some(SkipReason::Preflight),
            ReadError::Empty => Some(SkipReason::Empty),
            ReadError::Corrupt(_) => Some(SkipReason::Corrupt),
            ReadError::Io(_) | ReadError::Parse(_) => None,
        }
    }
}

/// Shared contract of every source reader
pub trait SourceReader: Send + Sync {
    /// Read a file into per-unit outcomes.
    ///
    /// `encoding` is only consulted by text formats.
    fn read(&self, path: &Path, encoding: SourceEncoding)
    -> Result<Vec<RecordOutcome>, ReadError>;
}

/// Reader options shared across formats
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Re-split misaligned delimited rows into positional `col_<i>` fields
    pub positional_recovery: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            positional_recovery: true,
        }
    }
}

/// Choose a format from the case-insensitive file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use unified_ingest::import::detect_format;
/// use unified_ingest::models::SourceFormat;
///
/// assert_eq!(detect_format(Path::new("people.CSV")), Some(SourceFormat::Delimited));
/// assert_eq!(detect_format(Path::new("notes.txt")), None);
/// ```
pub fn detect_format(path: &Path) -> Option<SourceFormat> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "csv" | "tsv" => Some(SourceFormat::Delimited),
        "json" | "jsonl" | "ndjson" => Some(SourceFormat::JsonLines),
        "xml" => Some(SourceFormat::Xml),
        "xlsx" | "xls" | "xlsm" | "ods" => Some(SourceFormat::Spreadsheet),
        "sql" | "dump" => Some(SourceFormat::SqlDump),
        "parquet" => Some(SourceFormat::Columnar),
        _ => None,
    }
}

/// Build the reader for a format
pub fn reader_for(format: SourceFormat, options: ReaderOptions) -> Box<dyn SourceReader> {
    match format {
        SourceFormat::Delimited => Box::new(DelimitedReader::new(options.positional_recovery)),
        SourceFormat::JsonLines => Box::new(JsonReader),
        SourceFormat::Xml => Box::new(XmlReader),
        SourceFormat::Spreadsheet => Box::new(SpreadsheetReader),
        SourceFormat::SqlDump => Box::new(SqlDumpReader),
        SourceFormat::Columnar => Box::new(ColumnarReader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_by_extension() {
        let cases = [
            ("a.csv", Some(SourceFormat::Delimited)),
            ("a.TSV", Some(SourceFormat::Delimited)),
            ("a.json", Some(SourceFormat::JsonLines)),
            ("a.jsonl", Some(SourceFormat::JsonLines)),
            ("a.ndjson", Some(SourceFormat::JsonLines)),
            ("a.xml", Some(SourceFormat::Xml)),
            ("a.xlsx", Some(SourceFormat::Spreadsheet)),
            ("a.xls", Some(SourceFormat::Spreadsheet)),
            ("a.ods", Some(SourceFormat::Spreadsheet)),
            ("a.sql", Some(SourceFormat::SqlDump)),
            ("a.dump", Some(SourceFormat::SqlDump)),
            ("a.Parquet", Some(SourceFormat::Columnar)),
            ("a.txt", None),
            ("README", None),
        ];
        for (name, expected) in cases {
            assert_eq!(detect_format(Path::new(name)), expected, "{}", name);
        }
    }

    #[test]
    fn test_read_error_skip_classification() {
        assert_eq!(
            ReadError::Preflight("x".into()).skip_reason(),
            Some(SkipReason::Preflight)
        );
        assert_eq!(ReadError::Empty.skip_reason(), Some(SkipReason::Empty));
        assert_eq!(ReadError::Parse("x".into()).skip_reason(), None);
    }
}
