//! Delimited text reader (CSV, TSV and semicolon-separated exports)

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use super::encoding::{SourceEncoding, read_text};
use super::{ReadError, SourceReader};
use crate::models::{DropReason, RawRecord, RecordOutcome, Recovery, Value};
use crate::validation::quality::{LineFormat, recover_corrupted_line};

/// Delimiters tried in order when sniffing the file layout
const DELIMITER_CANDIDATES: [u8; 3] = [b',', b';', b'\t'];

/// Reader for delimited text with a header row
#[derive(Debug, Clone)]
pub struct DelimitedReader {
    positional_recovery: bool,
}

impl DelimitedReader {
    pub fn new(positional_recovery: bool) -> Self {
        Self {
            positional_recovery,
        }
    }

    /// Parse already-decoded text
    pub fn read_str(&self, text: &str) -> Result<Vec<RecordOutcome>, ReadError> {
        if text.trim().is_empty() {
            return Err(ReadError::Empty);
        }

        let first_line = text.lines().next().unwrap_or_default();
        if !DELIMITER_CANDIDATES
            .iter()
            .any(|d| first_line.contains(*d as char))
        {
            return Err(ReadError::Preflight(
                "first line contains no ',', ';' or tab delimiter".to_string(),
            ));
        }

        let delimiter = choose_delimiter(text, first_line);
        tracing::debug!("Using delimiter {:?}", delimiter as char);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ReadError::Parse(format!("Failed to read header row: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut outcomes = Vec::new();
        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Dropping unreadable delimited row: {}", e);
                    outcomes.push(RecordOutcome::Dropped(DropReason::MalformedRow));
                    continue;
                }
            };

            if row.iter().all(|field| field.trim().is_empty()) {
                outcomes.push(RecordOutcome::Dropped(DropReason::EmptyRow));
                continue;
            }

            if row.len() == headers.len() {
                let record: RawRecord = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.clone(), Value::Text(v.to_string())))
                    .collect();
                outcomes.push(RecordOutcome::Parsed(record));
            } else {
                outcomes.push(self.recover_row(text, &row, delimiter));
            }
        }

        Ok(outcomes)
    }

    /// Positional fallback for a row whose width differs from the header.
    ///
    /// Only the first physical line of the row is re-split, on a plain
    /// delimiter search. Quoted delimiters split the field and keep their
    /// quote characters, and the tail of a multi-line quoted field is lost.
    fn recover_row(&self, text: &str, row: &StringRecord, delimiter: u8) -> RecordOutcome {
        if !self.positional_recovery {
            return RecordOutcome::Dropped(DropReason::MalformedRow);
        }

        let line = raw_line(text, row)
            .map(str::to_string)
            .unwrap_or_else(|| row.iter().collect::<Vec<_>>().join(&(delimiter as char).to_string()));

        match recover_corrupted_line(&line, LineFormat::Delimited) {
            Some(record) => RecordOutcome::Recovered(record, Recovery::PositionalRow),
            None => RecordOutcome::Dropped(DropReason::MalformedRow),
        }
    }
}

impl Default for DelimitedReader {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SourceReader for DelimitedReader {
    fn read(
        &self,
        path: &Path,
        encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let text = read_text(path, encoding)?;
        self.read_str(&text)
    }
}

/// Pick the first candidate that yields data rows.
///
/// A candidate yields nothing when it produces no data rows, or a single-column
/// header while the header line still holds a later candidate.
fn choose_delimiter(text: &str, header_line: &str) -> u8 {
    for (i, candidate) in DELIMITER_CANDIDATES.iter().enumerate() {
        let later_present = DELIMITER_CANDIDATES[i + 1..]
            .iter()
            .any(|d| header_line.contains(*d as char));

        let mut reader = ReaderBuilder::new()
            .delimiter(*candidate)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let header_width = reader.headers().map(|h| h.len()).unwrap_or(0);
        let has_rows = reader.records().next().is_some();

        if !has_rows || (header_width <= 1 && later_present) {
            continue;
        }
        return *candidate;
    }

    // Nothing yields rows: use the first delimiter the header actually contains
    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .find(|d| header_line.contains(*d as char))
        .unwrap_or(b',')
}

/// Raw source line a parsed row started on
fn raw_line<'a>(text: &'a str, row: &StringRecord) -> Option<&'a str> {
    let start = usize::try_from(row.position()?.byte()).ok()?;
    let rest = text.get(start..)?;
    Some(rest.lines().next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(outcomes: &[RecordOutcome]) -> Vec<&RawRecord> {
        outcomes.iter().filter_map(RecordOutcome::record).collect()
    }

    #[test]
    fn test_comma_file() {
        let reader = DelimitedReader::default();
        let outcomes = reader
            .read_str("name,email\nAnn,ann@x.com\nBob,bob@x.com\n")
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        let recs = records(&outcomes);
        assert_eq!(recs[0].get("name"), Some(&Value::from("Ann")));
        assert_eq!(recs[1].get("email"), Some(&Value::from("bob@x.com")));
    }

    #[test]
    fn test_semicolon_fallback() {
        let reader = DelimitedReader::default();
        let outcomes = reader.read_str("name;email\nAnn;ann@x.com\n").unwrap();
        let recs = records(&outcomes);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].get("email"), Some(&Value::from("ann@x.com")));
    }

    #[test]
    fn test_tab_fallback() {
        let reader = DelimitedReader::default();
        let outcomes = reader.read_str("name\tphone\nAnn\t555\n").unwrap();
        let recs = records(&outcomes);
        assert_eq!(recs[0].get("phone"), Some(&Value::from("555")));
    }

    #[test]
    fn test_misaligned_row_recovered_positionally() {
        let reader = DelimitedReader::default();
        let outcomes = reader
            .read_str("name,email\nAnn,ann@x.com\nBob,bob@x.com,extra\n")
            .unwrap();
        assert!(matches!(outcomes[0], RecordOutcome::Parsed(_)));
        match &outcomes[1] {
            RecordOutcome::Recovered(record, Recovery::PositionalRow) => {
                assert_eq!(record.get("col_0"), Some(&Value::from("Bob")));
                assert_eq!(record.get("col_2"), Some(&Value::from("extra")));
            }
            other => panic!("expected positional recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_misaligned_row_dropped_without_recovery() {
        let reader = DelimitedReader::new(false);
        let outcomes = reader.read_str("a,b\n1,2\n3\n").unwrap();
        assert_eq!(
            outcomes[1],
            RecordOutcome::Dropped(DropReason::MalformedRow)
        );
    }

    #[test]
    fn test_single_field_row_is_unrecoverable() {
        let reader = DelimitedReader::default();
        let outcomes = reader.read_str("a,b\nlonely\n").unwrap();
        assert_eq!(
            outcomes,
            vec![RecordOutcome::Dropped(DropReason::MalformedRow)]
        );
    }

    #[test]
    fn test_preflight_and_empty() {
        let reader = DelimitedReader::default();
        assert!(matches!(
            reader.read_str("no delimiters here\nstill none\n"),
            Err(ReadError::Preflight(_))
        ));
        assert!(matches!(reader.read_str("  \n"), Err(ReadError::Empty)));
    }

    #[test]
    fn test_quoted_commas_stay_in_field() {
        let reader = DelimitedReader::default();
        let outcomes = reader
            .read_str("name,address\n\"Smith, Ann\",\"1 Road, Town\"\n")
            .unwrap();
        let recs = records(&outcomes);
        assert_eq!(recs[0].get("name"), Some(&Value::from("Smith, Ann")));
    }

    #[test]
    fn test_positional_recovery_ignores_quoting() {
        let reader = DelimitedReader::default();
        let outcomes = reader
            .read_str("name,email\nBob,\"Smith, Jr\",bob@x.com\n")
            .unwrap();
        match &outcomes[0] {
            RecordOutcome::Recovered(record, Recovery::PositionalRow) => {
                assert_eq!(record.len(), 4);
                assert_eq!(record.get("col_1"), Some(&Value::from("\"Smith")));
                assert_eq!(record.get("col_3"), Some(&Value::from("bob@x.com")));
            }
            other => panic!("expected positional recovery, got {:?}", other),
        }

        let outcomes = reader
            .read_str("name,email\nBob,\"line one\nline two\",extra\n")
            .unwrap();
        match &outcomes[0] {
            RecordOutcome::Recovered(record, Recovery::PositionalRow) => {
                assert_eq!(record.get("col_0"), Some(&Value::from("Bob")));
                assert_eq!(record.get("col_1"), Some(&Value::from("\"line one")));
                assert!(record.get("col_2").is_none());
            }
            other => panic!("expected positional recovery, got {:?}", other),
        }
    }
}
