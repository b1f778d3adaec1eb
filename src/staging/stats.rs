//! Run summary: counters for every skip, recovery, drop and load event

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::LoadReport;
use crate::models::{DropReason, FileOutcome, Recovery, SkipReason, SourceFileDescriptor};

/// Statistics from one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Run identifier
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Files matched by the source pattern
    pub files_discovered: usize,
    /// Files that produced records
    pub files_read: usize,
    /// Skipped files by reason
    pub files_skipped: BTreeMap<SkipReason, usize>,
    /// Files that failed with a read error
    pub files_errored: usize,
    /// Records produced by readers (parsed or recovered)
    pub records_read: usize,
    pub records_recovered: BTreeMap<Recovery, usize>,
    pub records_dropped: BTreeMap<DropReason, usize>,
    /// Records removed by deduplication
    pub duplicates_removed: usize,
    /// Rows in the master record set
    pub master_records: usize,
    /// Per-file descriptors in path order
    pub files: Vec<SourceFileDescriptor>,
    /// Per-file load reports, once loaded
    pub load_reports: Vec<LoadReport>,
    /// Number of errors encountered
    pub errors_count: usize,
    /// List of errors (limited to first 100)
    pub errors: Vec<String>,
    /// Duration of the run
    #[serde(skip)]
    pub duration: Duration,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    /// Create a summary for a run starting now
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            files_discovered: 0,
            files_read: 0,
            files_skipped: BTreeMap::new(),
            files_errored: 0,
            records_read: 0,
            records_recovered: BTreeMap::new(),
            records_dropped: BTreeMap::new(),
            duplicates_removed: 0,
            master_records: 0,
            files: Vec::new(),
            load_reports: Vec::new(),
            errors_count: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Add an error (limited to 100)
    pub fn add_error(&mut self, error: String) {
        self.errors_count += 1;
        if self.errors.len() < 100 {
            self.errors.push(error);
        }
    }

    /// Count one file by its outcome and keep its descriptor
    pub fn record_file(&mut self, descriptor: SourceFileDescriptor) {
        match &descriptor.outcome {
            FileOutcome::Success => self.files_read += 1,
            FileOutcome::Skipped(reason) => *self.files_skipped.entry(*reason).or_default() += 1,
            FileOutcome::ReadError(message) => {
                self.files_errored += 1;
                self.add_error(format!("{}: {}", descriptor.path.display(), message));
            }
        }
        self.files.push(descriptor);
    }

    pub fn add_recovered(&mut self, recovery: Recovery, count: usize) {
        *self.records_recovered.entry(recovery).or_default() += count;
    }

    pub fn add_dropped(&mut self, reason: DropReason, count: usize) {
        *self.records_dropped.entry(reason).or_default() += count;
    }

    /// Attach a load report, folding its errors into the run errors
    pub fn add_load_report(&mut self, report: LoadReport) {
        for error in &report.errors {
            self.add_error(format!("{}: {}", report.source, error));
        }
        self.load_reports.push(report);
    }

    pub fn files_skipped_total(&self) -> usize {
        self.files_skipped.values().sum()
    }

    pub fn records_recovered_total(&self) -> usize {
        self.records_recovered.values().sum()
    }

    pub fn records_dropped_total(&self) -> usize {
        self.records_dropped.values().sum()
    }

    /// Batches rolled back across all load reports
    pub fn batches_failed(&self) -> usize {
        self.load_reports.iter().map(|r| r.batches_failed).sum()
    }

    /// Stamp the end of the run
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration = (now - self.started_at).to_std().unwrap_or_default();
        self.finished_at = Some(now);
    }

    /// Get records per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.records_read as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}
