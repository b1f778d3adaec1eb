//! Merge per-file record sets into one deduplicated master set

use std::collections::BTreeMap;

use indexmap::IndexSet;

use crate::models::{CANONICAL_KEY_FIELD, INGEST_TIMESTAMP_FIELD, NormalizedRecord};

/// Deduplicated union of every normalized record in a run.
///
/// Columns are `canonical_key`, the remaining fields in first-seen order, then
/// `ingest_timestamp`. Rows are ordered by `canonical_key` and every row has
/// one value per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterRecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Default for MasterRecordSet {
    fn default() -> Self {
        Self {
            columns: vec![
                CANONICAL_KEY_FIELD.to_string(),
                INGEST_TIMESTAMP_FIELD.to_string(),
            ],
            rows: Vec::new(),
        }
    }
}

impl MasterRecordSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell of `row` under `column`, if both exist
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    /// Row whose canonical key is `key`
    pub fn find(&self, key: &str) -> Option<&[String]> {
        let index = self.column_index(CANONICAL_KEY_FIELD)?;
        self.rows
            .iter()
            .find(|row| row.get(index).map(String::as_str) == Some(key))
            .map(Vec::as_slice)
    }
}

/// Normalized records of one source file
#[derive(Debug, Clone)]
pub struct FileRecords {
    /// File name used by the tie-break
    pub file_name: String,
    pub records: Vec<NormalizedRecord>,
}

/// Master set plus the number of records deduplication removed
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub master: MasterRecordSet,
    pub duplicates_removed: usize,
}

/// Merge record sets given in path order.
///
/// One record is kept per `canonical_key`. A later `ingest_timestamp` wins;
/// on equal timestamps the file name sorting first wins; within one file the
/// first record seen wins.
pub fn merge(sources: Vec<FileRecords>) -> MergeOutcome {
    let mut fields: IndexSet<String> = IndexSet::new();
    for source in &sources {
        for record in &source.records {
            for name in record.fields.keys() {
                if name != CANONICAL_KEY_FIELD && name != INGEST_TIMESTAMP_FIELD {
                    fields.insert(name.clone());
                }
            }
        }
    }

    let mut total = 0usize;
    let mut winners: BTreeMap<String, (NormalizedRecord, String)> = BTreeMap::new();
    for source in sources {
        for record in source.records {
            total += 1;
            match winners.get(&record.canonical_key) {
                Some((current, current_file))
                    if !replaces(&record, &source.file_name, current, current_file) => {}
                _ => {
                    winners.insert(
                        record.canonical_key.clone(),
                        (record, source.file_name.clone()),
                    );
                }
            }
        }
    }

    let mut columns = Vec::with_capacity(fields.len() + 2);
    columns.push(CANONICAL_KEY_FIELD.to_string());
    columns.extend(fields.iter().cloned());
    columns.push(INGEST_TIMESTAMP_FIELD.to_string());

    let rows: Vec<Vec<String>> = winners
        .into_values()
        .map(|(record, _)| {
            columns
                .iter()
                .map(|column| record.value(column).to_string())
                .collect()
        })
        .collect();

    MergeOutcome {
        duplicates_removed: total - rows.len(),
        master: MasterRecordSet { columns, rows },
    }
}

fn replaces(
    candidate: &NormalizedRecord,
    candidate_file: &str,
    current: &NormalizedRecord,
    current_file: &str,
) -> bool {
    match candidate.ingest_timestamp.cmp(&current.ingest_timestamp) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate_file < current_file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(key: &str, timestamp: &str, pairs: &[(&str, &str)]) -> NormalizedRecord {
        let fields: IndexMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NormalizedRecord {
            fields,
            canonical_key: key.to_string(),
            ingest_timestamp: timestamp.to_string(),
        }
    }

    fn source(name: &str, records: Vec<NormalizedRecord>) -> FileRecords {
        FileRecords {
            file_name: name.to_string(),
            records,
        }
    }

    const T1: &str = "2024-05-01 12:30:00.000000";
    const T2: &str = "2024-05-02 08:00:00.000000";

    #[test]
    fn test_column_order_and_fill() {
        let outcome = merge(vec![
            source("a.csv", vec![record("k2", T1, &[("email", "b@x"), ("city", "York")])]),
            source("b.json", vec![record("k1", T1, &[("name", "ann"), ("email", "a@x")])]),
        ]);
        let master = outcome.master;

        assert_eq!(
            master.columns,
            vec!["canonical_key", "email", "city", "name", "ingest_timestamp"]
        );
        // Sorted by key
        assert_eq!(master.rows[0][0], "k1");
        assert_eq!(master.value(0, "city"), Some(""));
        assert_eq!(master.value(1, "city"), Some("York"));
        assert_eq!(master.value(1, "ingest_timestamp"), Some(T1));
        assert_eq!(outcome.duplicates_removed, 0);
    }

    #[test]
    fn test_tie_break_prefers_latest_timestamp() {
        let outcome = merge(vec![
            source("a.csv", vec![record("k", T2, &[("city", "new")])]),
            source("b.csv", vec![record("k", T1, &[("city", "old")])]),
        ]);
        assert_eq!(outcome.master.len(), 1);
        assert_eq!(outcome.master.value(0, "city"), Some("new"));
        assert_eq!(outcome.duplicates_removed, 1);
    }

    #[test]
    fn test_tie_break_prefers_first_file_name_then_first_seen() {
        let outcome = merge(vec![
            source("b.csv", vec![record("k", T1, &[("city", "from b")])]),
            source(
                "a.csv",
                vec![
                    record("k", T1, &[("city", "from a")]),
                    record("k", T1, &[("city", "a again")]),
                ],
            ),
        ]);
        assert_eq!(outcome.master.value(0, "city"), Some("from a"));
        assert_eq!(outcome.duplicates_removed, 2);
    }

    #[test]
    fn test_merge_is_order_independent_for_winner() {
        let a = || source("a.csv", vec![record("k", T1, &[("city", "A")])]);
        let b = || source("b.csv", vec![record("k", T1, &[("city", "B")])]);
        let forward = merge(vec![a(), b()]);
        let backward = merge(vec![b(), a()]);
        assert_eq!(forward.master.find("k"), backward.master.find("k"));
    }

    #[test]
    fn test_empty_merge_keeps_reserved_columns() {
        let outcome = merge(Vec::new());
        assert!(outcome.master.is_empty());
        assert_eq!(outcome.master, MasterRecordSet::default());
    }
}
