//! File ingestion: discovery, per-file processing on a worker pool, merge

use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::StagingError;
use super::merge::{FileRecords, MasterRecordSet, merge};
use super::snapshot::write_snapshot;
use super::stats::RunSummary;
use crate::config::PipelineConfig;
use crate::import::encoding::{DEFAULT_SAMPLE_SIZE, SourceEncoding, detect_encoding};
use crate::import::{ReaderOptions, detect_format, reader_for};
use crate::models::{
    DropReason, FileOutcome, NormalizedRecord, RecordOutcome, Recovery, SkipReason,
    SourceFileDescriptor,
};
use crate::transform::{DEFAULT_SEPARATOR, FieldNormalizer, flatten};
use crate::validation::quality::MAX_VALUE_LENGTH;

/// Options for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Glob pattern matched inside the source directory
    pub pattern: String,
    /// Bytes sampled for charset detection
    pub encoding_sample_size: usize,
    pub reader: ReaderOptions,
    pub max_value_length: usize,
    pub required_fields: Vec<String>,
    /// Worker threads (0 = available cores)
    pub threads: usize,
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            encoding_sample_size: DEFAULT_SAMPLE_SIZE,
            reader: ReaderOptions::default(),
            max_value_length: MAX_VALUE_LENGTH,
            required_fields: Vec::new(),
            threads: 0,
            progress: false,
        }
    }
}

impl IngestOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            pattern: config.source.pattern.clone(),
            encoding_sample_size: config.source.encoding_sample_size,
            reader: ReaderOptions {
                positional_recovery: config.quality.positional_recovery,
            },
            max_value_length: config.quality.max_value_length,
            required_fields: config.quality.required_fields.clone(),
            threads: config.workers.threads,
            progress: config.workers.progress,
        }
    }
}

/// What processing one file produced
#[derive(Debug, Clone)]
pub struct FileResult {
    pub descriptor: SourceFileDescriptor,
    pub records: Vec<NormalizedRecord>,
    /// Records produced by the reader (parsed or recovered)
    pub records_read: usize,
    pub recovered: BTreeMap<Recovery, usize>,
    pub dropped: BTreeMap<DropReason, usize>,
}

impl FileResult {
    fn new(descriptor: SourceFileDescriptor) -> Self {
        Self {
            descriptor,
            records: Vec::new(),
            records_read: 0,
            recovered: BTreeMap::new(),
            dropped: BTreeMap::new(),
        }
    }

    fn finish(mut self, outcome: FileOutcome, message: Option<String>) -> Self {
        self.descriptor.outcome = outcome;
        self.descriptor.message = message;
        self
    }
}

/// Merged master set and run summary of one ingestion
#[derive(Debug, Clone)]
pub struct IngestOutput {
    pub master: MasterRecordSet,
    pub summary: RunSummary,
}

/// Discover files matching a pattern in a local directory, sorted by path
pub fn discover_files(source_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, StagingError> {
    if !source_dir.is_dir() {
        return Err(StagingError::SourceDir {
            path: source_dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    // Probe listing so permission problems surface as run-fatal
    fs::read_dir(source_dir).map_err(|e| StagingError::SourceDir {
        path: source_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let base = glob::Pattern::escape(&source_dir.display().to_string());
    let full_pattern = format!("{}/{}", base, pattern);
    let entries = glob::glob(&full_pattern)
        .map_err(|e| StagingError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Error accessing path: {}", e),
        }
    }

    files.sort();
    Ok(files)
}

/// Detect, read, flatten and normalize one file.
///
/// Never fails: every problem is recorded in the returned descriptor.
pub fn process_file(
    path: &Path,
    options: &IngestOptions,
    normalizer: &FieldNormalizer,
) -> FileResult {
    let format = detect_format(path);
    let mut result = FileResult::new(SourceFileDescriptor::new(path.to_path_buf(), format));

    let Some(format) = format else {
        warn!(file = %path.display(), "Skipping unsupported file");
        return result.finish(FileOutcome::Skipped(SkipReason::Unsupported), None);
    };

    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            warn!(file = %path.display(), "Skipping empty file");
            return result.finish(FileOutcome::Skipped(SkipReason::Empty), None);
        }
        Ok(_) => {}
        Err(e) => {
            warn!(file = %path.display(), error = %e, "File unreadable");
            return result.finish(FileOutcome::ReadError(e.to_string()), Some(e.to_string()));
        }
    }

    let encoding = if format.is_text() {
        let detected = detect_encoding(path, options.encoding_sample_size);
        result.descriptor.encoding = Some(detected.label().to_string());
        detected
    } else {
        SourceEncoding::Utf8
    };

    let reader = reader_for(format, options.reader);
    let outcomes = match reader.read(path, encoding) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            let message = e.to_string();
            return match e.skip_reason() {
                Some(reason) => {
                    warn!(file = %path.display(), %reason, error = %message, "Skipping file");
                    result.finish(FileOutcome::Skipped(reason), Some(message))
                }
                None => {
                    warn!(file = %path.display(), error = %message, "Failed to read file");
                    result.finish(FileOutcome::ReadError(message.clone()), Some(message))
                }
            };
        }
    };

    if outcomes.is_empty() {
        warn!(file = %path.display(), "No records found");
        return result.finish(FileOutcome::Skipped(SkipReason::Empty), None);
    }

    for outcome in outcomes {
        let raw = match outcome {
            RecordOutcome::Parsed(raw) => raw,
            RecordOutcome::Recovered(raw, recovery) => {
                *result.recovered.entry(recovery).or_default() += 1;
                raw
            }
            RecordOutcome::Dropped(reason) => {
                *result.dropped.entry(reason).or_default() += 1;
                continue;
            }
        };
        result.records_read += 1;

        match normalizer.normalize(flatten(&raw, DEFAULT_SEPARATOR)) {
            Ok(record) => result.records.push(record),
            Err(reason) => *result.dropped.entry(reason).or_default() += 1,
        }
    }

    debug!(
        file = %path.display(),
        %format,
        encoding = encoding.label(),
        records = result.records.len(),
        dropped = result.dropped.values().sum::<usize>(),
        "Processed file"
    );
    result.finish(FileOutcome::Success, None)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_message("Processing source files");
    pb
}

/// Ingest every matching file of `source_dir` and merge the results.
///
/// Files run on a worker pool; a failure or panic in one file only affects
/// that file. Fails when the directory cannot be listed or no file yields a
/// usable result.
pub fn ingest(source_dir: &Path, options: &IngestOptions) -> Result<IngestOutput, StagingError> {
    let mut summary = RunSummary::new();
    let normalizer = FieldNormalizer::new(summary.started_at)
        .with_max_value_length(options.max_value_length)
        .with_required_fields(options.required_fields.clone());

    let files = discover_files(source_dir, &options.pattern)?;
    summary.files_discovered = files.len();
    info!(run_id = %summary.run_id, dir = %source_dir.display(), files = files.len(), "Starting ingestion");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .map_err(|e| StagingError::Pool(e.to_string()))?;
    let progress = options.progress.then(|| progress_bar(files.len() as u64));

    let results: Vec<FileResult> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| process_file(path, options, &normalizer)))
                        .unwrap_or_else(|payload| {
                            let message = format!("panic: {}", panic_message(payload.as_ref()));
                            warn!(file = %path.display(), error = %message, "File processing panicked");
                            FileResult::new(SourceFileDescriptor::new(
                                path.clone(),
                                detect_format(path),
                            ))
                            .finish(FileOutcome::ReadError(message.clone()), Some(message))
                        });
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                result
            })
            .collect()
    });
    if let Some(pb) = progress {
        pb.finish_with_message("Source files processed");
    }

    let mut sources = Vec::new();
    for result in results {
        summary.records_read += result.records_read;
        for (recovery, count) in result.recovered {
            summary.add_recovered(recovery, count);
        }
        for (reason, count) in result.dropped {
            summary.add_dropped(reason, count);
        }
        if result.descriptor.outcome == FileOutcome::Success {
            sources.push(FileRecords {
                file_name: result.descriptor.file_name(),
                records: result.records,
            });
        }
        summary.record_file(result.descriptor);
    }

    if summary.files_read == 0 {
        return Err(StagingError::NoValidSources {
            path: source_dir.to_path_buf(),
            discovered: summary.files_discovered,
        });
    }

    let merged = merge(sources);
    summary.duplicates_removed = merged.duplicates_removed;
    summary.master_records = merged.master.len();
    summary.finish();

    info!(
        run_id = %summary.run_id,
        files_read = summary.files_read,
        files_skipped = summary.files_skipped_total(),
        files_errored = summary.files_errored,
        records = summary.records_read,
        recovered = summary.records_recovered_total(),
        dropped = summary.records_dropped_total(),
        duplicates = summary.duplicates_removed,
        master = summary.master_records,
        "Ingestion finished in {}",
        summary.duration_string()
    );

    Ok(IngestOutput {
        master: merged.master,
        summary,
    })
}

/// Ingest `source_dir` and write the master set to `snapshot_dir`
pub fn ingest_to_snapshot(
    source_dir: &Path,
    snapshot_dir: &Path,
    options: &IngestOptions,
) -> Result<IngestOutput, StagingError> {
    let output = ingest(source_dir, options)?;
    write_snapshot(snapshot_dir, &output.master)?;
    Ok(output)
}
