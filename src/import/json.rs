//! JSON document and JSON Lines reader

use std::path::Path;

use super::encoding::{SourceEncoding, read_text};
use super::{ReadError, SourceReader};
use crate::models::{DropReason, RecordOutcome, Recovery, Value};
use crate::validation::quality::repair_json_line;

/// Reader for a JSON array/object document or newline-delimited JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl JsonReader {
    /// Parse already-decoded text
    pub fn read_str(&self, text: &str) -> Result<Vec<RecordOutcome>, ReadError> {
        let Some(first_line) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Err(ReadError::Empty);
        };
        if !(first_line.starts_with('{') || first_line.starts_with('[')) {
            return Err(ReadError::Preflight(
                "first line does not start with '{' or '['".to_string(),
            ));
        }

        // Whole document first: a pretty-printed array or a single object
        if let Ok(document) = serde_json::from_str::<serde_json::Value>(text) {
            let mut outcomes = Vec::new();
            push_units(document, None, &mut outcomes);
            return Ok(outcomes);
        }

        let mut outcomes = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) => push_units(value, None, &mut outcomes),
                Err(parse_err) => match repair_json_line(line)
                    .and_then(|fixed| serde_json::from_str::<serde_json::Value>(&fixed).ok())
                {
                    Some(value) => {
                        tracing::debug!("Repaired JSON on line {}", line_no + 1);
                        push_units(value, Some(Recovery::RepairedJson), &mut outcomes);
                    }
                    None => {
                        tracing::warn!(
                            "Dropping malformed JSON on line {}: {}",
                            line_no + 1,
                            parse_err
                        );
                        outcomes.push(RecordOutcome::Dropped(DropReason::MalformedJson));
                    }
                },
            }
        }

        Ok(outcomes)
    }
}

impl SourceReader for JsonReader {
    fn read(
        &self,
        path: &Path,
        encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let text = read_text(path, encoding)?;
        self.read_str(&text)
    }
}

/// An array yields one unit per element; an object yields one record
fn push_units(
    value: serde_json::Value,
    recovery: Option<Recovery>,
    outcomes: &mut Vec<RecordOutcome>,
) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                outcomes.push(object_outcome(item, recovery));
            }
        }
        other => outcomes.push(object_outcome(other, recovery)),
    }
}

fn object_outcome(value: serde_json::Value, recovery: Option<Recovery>) -> RecordOutcome {
    match Value::from(value) {
        Value::Map(record) => match recovery {
            Some(kind) => RecordOutcome::Recovered(record, kind),
            None => RecordOutcome::Parsed(record),
        },
        _ => RecordOutcome::Dropped(DropReason::NonObjectJson),
    }
}
