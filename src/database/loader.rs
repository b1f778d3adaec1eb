//! Store loader: additive schema evolution then batched inserts
//!
//! Column additions and the cached view of the store schema are serialized
//! behind one mutex per loader. Inserts go out in fixed-size batches; a failed
//! batch is logged, counted and skipped while later batches continue.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{AddColumnOutcome, ColumnType, RecordStore, StoreError, StoreResult};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::models::INGEST_TIMESTAMP_FIELD;
use crate::staging::{MasterRecordSet, read_snapshot, snapshot_files};
use crate::transform::format_ingest_timestamp;
use crate::validation::input::sanitize_column_name;

/// Outcome of one schema evolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaEvolution {
    /// Columns added by this pass
    pub added: Vec<String>,
    /// Columns whose addition failed
    pub failed: Vec<String>,
}

/// Load statistics for one record set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    /// Source of the rows (snapshot file or run label)
    pub source: String,
    /// Rows offered to the loader
    pub rows_total: usize,
    /// Rows committed
    pub rows_inserted: usize,
    /// Batches attempted
    pub batches_total: usize,
    /// Batches rolled back
    pub batches_failed: usize,
    /// Columns added to the store
    pub columns_added: Vec<String>,
    /// Incoming columns left out of the inserts
    pub columns_excluded: Vec<String>,
    /// Error messages (limited to first 100)
    pub errors: Vec<String>,
}

impl LoadReport {
    fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    fn add_error(&mut self, error: String) {
        if self.errors.len() < 100 {
            self.errors.push(error);
        }
    }

    /// True when every batch committed and no column was excluded
    pub fn is_clean(&self) -> bool {
        self.batches_failed == 0 && self.columns_excluded.is_empty() && self.errors.is_empty()
    }
}

/// Loads record sets into a [`RecordStore`] table
pub struct StoreLoader<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    table: String,
    batch_size: usize,
    /// Lowercased store column names; `None` until first read
    schema: Mutex<Option<HashSet<String>>>,
}

impl<'a, S: RecordStore + ?Sized> StoreLoader<'a, S> {
    /// Create a loader for `table`
    pub fn new(store: &'a S, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            schema: Mutex::new(None),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Make sure the store holds every column in `columns`.
    ///
    /// The table is created and its columns read on first use; afterwards
    /// only the cache is consulted, so a repeated call issues no add-column
    /// calls for columns already seen.
    pub fn ensure_columns(&self, columns: &[String]) -> StoreResult<SchemaEvolution> {
        let mut guard = self
            .schema
            .lock()
            .map_err(|e| StoreError::ConnectionFailed(format!("Lock error: {}", e)))?;

        if guard.is_none() {
            self.store.initialize(&self.table)?;
            let existing = self.store.describe_columns(&self.table)?;
            debug!(table = %self.table, columns = existing.len(), "Read store schema");
            *guard = Some(existing.iter().map(|c| c.to_lowercase()).collect());
        }
        let Some(known) = guard.as_mut() else {
            return Err(StoreError::MigrationFailed(
                "Schema cache unavailable".to_string(),
            ));
        };

        let mut evolution = SchemaEvolution::default();
        for column in columns {
            let lowered = column.to_lowercase();
            if known.contains(&lowered) {
                continue;
            }
            match self
                .store
                .add_column(&self.table, column, ColumnType::for_column(column))
            {
                Ok(outcome) => {
                    if outcome == AddColumnOutcome::Added {
                        info!(table = %self.table, column = %column, "Added store column");
                        evolution.added.push(column.clone());
                    }
                    known.insert(lowered);
                }
                Err(e) => {
                    warn!(table = %self.table, column = %column, error = %e, "Column addition failed");
                    evolution.failed.push(column.clone());
                }
            }
        }

        Ok(evolution)
    }

    /// Load one record set.
    ///
    /// Column names are sanitized first; names that cannot be sanitized or
    /// collide with an earlier column are excluded. `ingest_timestamp` values
    /// are coerced, falling back to the load time when missing or unparseable.
    pub fn load(&self, source: &str, set: &MasterRecordSet) -> StoreResult<LoadReport> {
        let load_time = format_ingest_timestamp(&Utc::now());
        let mut report = LoadReport::new(source);
        report.rows_total = set.rows.len();

        // (source index, store name)
        let mut projection: Vec<(usize, String)> = Vec::with_capacity(set.columns.len());
        let mut seen = HashSet::new();
        for (i, raw) in set.columns.iter().enumerate() {
            match sanitize_column_name(raw) {
                Ok(name) if seen.insert(name.to_lowercase()) => projection.push((i, name)),
                Ok(_) => report.columns_excluded.push(raw.clone()),
                Err(e) => {
                    warn!(column = %raw, error = %e, "Column name rejected");
                    report.columns_excluded.push(raw.clone());
                }
            }
        }
        let timestamp_index = projection
            .iter()
            .position(|(_, name)| name.eq_ignore_ascii_case(INGEST_TIMESTAMP_FIELD));

        let mut target: Vec<String> = projection.iter().map(|(_, n)| n.clone()).collect();
        if timestamp_index.is_none() {
            target.push(INGEST_TIMESTAMP_FIELD.to_string());
        }

        let evolution = self.ensure_columns(&target)?;
        report.columns_added = evolution.added;
        for failed in &evolution.failed {
            report.add_error(format!("Failed to add column {}", failed));
        }
        report.columns_excluded.extend(evolution.failed.iter().cloned());
        let failed: HashSet<&str> = evolution.failed.iter().map(String::as_str).collect();

        // Positions in `target` that survive evolution
        let keep: Vec<usize> = (0..target.len())
            .filter(|i| !failed.contains(target[*i].as_str()))
            .collect();
        let columns: Vec<String> = keep.iter().map(|i| target[*i].clone()).collect();

        for (batch_no, chunk) in set.rows.chunks(self.batch_size).enumerate() {
            report.batches_total += 1;
            let rows: Vec<Vec<String>> = chunk
                .iter()
                .map(|row| {
                    keep.iter()
                        .map(|&t| match projection.get(t) {
                            Some((src, _)) if Some(t) == timestamp_index => {
                                coerce_timestamp(row.get(*src).map(String::as_str), &load_time)
                            }
                            Some((src, _)) => row.get(*src).cloned().unwrap_or_default(),
                            None => load_time.clone(),
                        })
                        .collect()
                })
                .collect();

            match self.store.insert_batch(&self.table, &columns, &rows) {
                Ok(count) => {
                    report.rows_inserted += count;
                    debug!(source, batch = batch_no + 1, rows = count, "Batch committed");
                }
                Err(e) => {
                    report.batches_failed += 1;
                    error!(source, batch = batch_no + 1, error = %e, "Batch insert failed");
                    report.add_error(format!("Batch {} failed: {}", batch_no + 1, e));
                }
            }
        }

        info!(
            source,
            rows = report.rows_inserted,
            batches = report.batches_total,
            failed_batches = report.batches_failed,
            "Load finished"
        );
        Ok(report)
    }

    /// Load every `*.parquet` file of a snapshot directory.
    ///
    /// Files are loaded on a pool of `concurrency` threads; a file that cannot
    /// be read yields a report carrying the error.
    pub fn load_snapshot(&self, dir: &Path, concurrency: usize) -> StoreResult<Vec<LoadReport>> {
        let files = snapshot_files(dir).map_err(|e| StoreError::SnapshotFailed(e.to_string()))?;
        if files.is_empty() {
            return Err(StoreError::SnapshotFailed(format!(
                "No snapshot files in {}",
                dir.display()
            )));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .build()
            .map_err(|e| StoreError::PoolFailed(e.to_string()))?;

        pool.install(|| {
            files
                .par_iter()
                .map(|path| self.load_snapshot_file(path))
                .collect::<StoreResult<Vec<_>>>()
        })
    }

    fn load_snapshot_file(&self, path: &Path) -> StoreResult<LoadReport> {
        let source = path.display().to_string();
        match read_snapshot(path) {
            Ok(set) => self.load(&source, &set),
            Err(e) => {
                error!(file = %source, error = %e, "Snapshot file unreadable");
                let mut report = LoadReport::new(source);
                report.add_error(e.to_string());
                Ok(report)
            }
        }
    }
}

/// Coerce a timestamp value into the stored layout.
///
/// Accepts the stored layout, ISO-8601 with `T`, RFC 3339 and bare dates.
pub fn coerce_timestamp(value: Option<&str>, fallback: &str) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return fallback.to_string();
    };
    parse_timestamp(value)
        .map(|t| format_ingest_timestamp(&t))
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_timestamp() {
        let fallback = "2024-01-01 00:00:00.000000";
        assert_eq!(
            coerce_timestamp(Some("2024-05-01 12:30:00.5"), fallback),
            "2024-05-01 12:30:00.500000"
        );
        assert_eq!(
            coerce_timestamp(Some("2024-05-01T12:30:00Z"), fallback),
            "2024-05-01 12:30:00.000000"
        );
        assert_eq!(
            coerce_timestamp(Some("2024-05-01"), fallback),
            "2024-05-01 00:00:00.000000"
        );
        assert_eq!(coerce_timestamp(Some("yesterday"), fallback), fallback);
        assert_eq!(coerce_timestamp(Some("  "), fallback), fallback);
        assert_eq!(coerce_timestamp(None, fallback), fallback);
    }

    #[test]
    fn test_load_report_cleanliness() {
        let mut report = LoadReport::new("x");
        assert!(report.is_clean());
        report.batches_failed = 1;
        assert!(!report.is_clean());
    }
}
