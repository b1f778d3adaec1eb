//! `load` and `run` commands: master record set into the store

use std::path::PathBuf;

use tracing::warn;

use super::ingest::{IngestArgs, print_summary};
use super::{CommandContext, print_json};
use crate::cli::error::CliError;
use crate::database::{DuckDbStore, LoadReport, StoreLoader};
use crate::staging::{IngestOptions, RunSummary, ingest_to_snapshot};

/// Load command arguments
#[derive(Debug, Clone, Default)]
pub struct LoadArgs {
    /// Snapshot directory (overrides `output.snapshot_dir`)
    pub snapshot: Option<PathBuf>,
    /// Print load reports as JSON
    pub json: bool,
}

/// Load every snapshot file into the configured store
pub fn handle_load(ctx: &CommandContext, args: &LoadArgs) -> Result<Vec<LoadReport>, CliError> {
    let snapshot_dir = ctx.snapshot_dir(args.snapshot.as_deref());
    let store = DuckDbStore::from_config(&ctx.config, &ctx.config_dir)?;
    let loader = StoreLoader::new(&store, ctx.config.database.table.clone())
        .with_batch_size(ctx.config.loader.batch_size);

    let reports = loader.load_snapshot(&snapshot_dir, ctx.config.loader.concurrency)?;

    if args.json {
        print_json(&reports)?;
    } else {
        for report in &reports {
            print_load_report(report);
        }
    }
    Ok(reports)
}

/// Ingest, snapshot, then load the master set directly
pub fn handle_run(ctx: &CommandContext, args: &IngestArgs) -> Result<RunSummary, CliError> {
    let source_dir = ctx.source_dir(args.source.as_deref());
    let snapshot_dir = ctx.snapshot_dir(args.snapshot.as_deref());
    let options = IngestOptions::from_config(&ctx.config);

    let output = ingest_to_snapshot(&source_dir, &snapshot_dir, &options)?;
    let mut summary = output.summary;

    let store = DuckDbStore::from_config(&ctx.config, &ctx.config_dir)?;
    let loader = StoreLoader::new(&store, ctx.config.database.table.clone())
        .with_batch_size(ctx.config.loader.batch_size);
    let source = snapshot_dir.display().to_string();
    let report = loader.load(&source, &output.master)?;
    if !report.is_clean() {
        warn!(
            failed_batches = report.batches_failed,
            excluded_columns = report.columns_excluded.len(),
            "Load completed with errors"
        );
    }
    summary.add_load_report(report);

    if args.json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
        for report in &summary.load_reports {
            print_load_report(report);
        }
    }
    Ok(summary)
}

fn print_load_report(report: &LoadReport) {
    println!("Loaded {}", report.source);
    println!(
        "  Rows: {} of {} inserted",
        report.rows_inserted, report.rows_total
    );
    println!(
        "  Batches: {} attempted, {} failed",
        report.batches_total, report.batches_failed
    );
    if !report.columns_added.is_empty() {
        println!("  Columns added: {}", report.columns_added.join(", "));
    }
    if !report.columns_excluded.is_empty() {
        println!("  Columns excluded: {}", report.columns_excluded.join(", "));
    }
    for error in &report.errors {
        println!("  error: {}", error);
    }
}
