//! `ingest` command: read, normalize and merge sources, then write the snapshot

use std::path::PathBuf;

use super::{CommandContext, print_json};
use crate::cli::error::CliError;
use crate::models::FileOutcome;
use crate::staging::{IngestOptions, RunSummary, ingest_to_snapshot};

/// Ingest command arguments
#[derive(Debug, Clone, Default)]
pub struct IngestArgs {
    /// Source directory (overrides `source.dir`)
    pub source: Option<PathBuf>,
    /// Snapshot directory (overrides `output.snapshot_dir`)
    pub snapshot: Option<PathBuf>,
    /// Print the run summary as JSON
    pub json: bool,
}

/// Run ingestion and write the snapshot; returns the run summary
pub fn handle_ingest(ctx: &CommandContext, args: &IngestArgs) -> Result<RunSummary, CliError> {
    let source_dir = ctx.source_dir(args.source.as_deref());
    let snapshot_dir = ctx.snapshot_dir(args.snapshot.as_deref());
    let options = IngestOptions::from_config(&ctx.config);

    let output = ingest_to_snapshot(&source_dir, &snapshot_dir, &options)?;

    if args.json {
        print_json(&output.summary)?;
    } else {
        print_summary(&output.summary);
        println!("Snapshot: {}", snapshot_dir.display());
    }
    Ok(output.summary)
}

/// Human-readable run summary
pub fn print_summary(summary: &RunSummary) {
    println!("Run {}", summary.run_id);
    println!(
        "  Files: {} discovered, {} read, {} skipped, {} errored",
        summary.files_discovered,
        summary.files_read,
        summary.files_skipped_total(),
        summary.files_errored
    );
    for (reason, count) in &summary.files_skipped {
        println!("    skipped ({}): {}", reason, count);
    }
    println!(
        "  Records: {} read, {} recovered, {} dropped",
        summary.records_read,
        summary.records_recovered_total(),
        summary.records_dropped_total()
    );
    for (recovery, count) in &summary.records_recovered {
        println!("    recovered ({}): {}", recovery, count);
    }
    for (reason, count) in &summary.records_dropped {
        println!("    dropped ({}): {}", reason, count);
    }
    println!(
        "  Master records: {} ({} duplicates removed)",
        summary.master_records, summary.duplicates_removed
    );
    for file in &summary.files {
        if let FileOutcome::ReadError(message) = &file.outcome {
            println!("    error {}: {}", file.path.display(), message);
        }
    }
    println!(
        "  Duration: {} ({:.0} records/s)",
        summary.duration_string(),
        summary.throughput()
    );
}
