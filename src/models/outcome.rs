//! Per-record outcomes reported by source readers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::RawRecord;

/// How a record that did not parse cleanly was salvaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Misaligned delimited row re-split into `col_<i>` fields
    PositionalRow,
    /// JSON line balanced with missing closers
    RepairedJson,
    /// SQL row whose value count differed from the column list
    PartialSqlRow,
}

/// Why a record was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MalformedRow,
    MalformedJson,
    MalformedStatement,
    EmptyRow,
    NonObjectJson,
    MissingRequiredField,
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Recovery::PositionalRow => "positional_row",
            Recovery::RepairedJson => "repaired_json",
            Recovery::PartialSqlRow => "partial_sql_row",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DropReason::MalformedRow => "malformed_row",
            DropReason::MalformedJson => "malformed_json",
            DropReason::MalformedStatement => "malformed_statement",
            DropReason::EmptyRow => "empty_row",
            DropReason::NonObjectJson => "non_object_json",
            DropReason::MissingRequiredField => "missing_required_field",
        };
        write!(f, "{}", name)
    }
}

/// Result of reading one unit (line, row, element, statement tuple)
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Parsed(RawRecord),
    Recovered(RawRecord, Recovery),
    Dropped(DropReason),
}

impl RecordOutcome {
    /// The record carried by this outcome, if any
    pub fn record(&self) -> Option<&RawRecord> {
        match self {
            RecordOutcome::Parsed(r) | RecordOutcome::Recovered(r, _) => Some(r),
            RecordOutcome::Dropped(_) => None,
        }
    }

    pub fn into_record(self) -> Option<RawRecord> {
        match self {
            RecordOutcome::Parsed(r) | RecordOutcome::Recovered(r, _) => Some(r),
            RecordOutcome::Dropped(_) => None,
        }
    }
}
