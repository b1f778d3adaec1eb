//! CLI binary entry point for unified-ingest

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use unified_ingest::cli::CliError;
#[cfg(feature = "cli")]
use unified_ingest::cli::commands::CommandContext;
#[cfg(feature = "cli")]
use unified_ingest::cli::commands::ingest::{IngestArgs, handle_ingest};
#[cfg(feature = "cli")]
use unified_ingest::cli::commands::inspect::{handle_init, handle_lookup, handle_status};
#[cfg(feature = "cli")]
use unified_ingest::cli::commands::load::{LoadArgs, handle_load, handle_run};
#[cfg(feature = "cli")]
use unified_ingest::logging::{LogConfig, LogFormat, LogLevel, init_logging};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "unified-ingest")]
#[command(about = "Ingest, deduplicate and load heterogeneous record sources")]
#[command(version)]
struct Cli {
    /// Directory holding .ingest.toml; relative paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Log at debug level (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: text or json
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Read, normalize and deduplicate sources into a Parquet snapshot
    Ingest {
        /// Source directory (overrides source.dir)
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Snapshot directory (overrides output.snapshot_dir)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the Parquet snapshot into the store
    Load {
        /// Snapshot directory (overrides output.snapshot_dir)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Print load reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest then load in one run
    Run {
        /// Source directory (overrides source.dir)
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Snapshot directory (overrides output.snapshot_dir)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the store table's columns and row count
    Status,

    /// Show the stored record for one canonical key
    Lookup {
        /// 64-character canonical key
        key: String,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Write a sample .ingest.toml
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[cfg(feature = "cli")]
fn setup_logging(cli: &Cli, ctx: Option<&CommandContext>) -> anyhow::Result<()> {
    let mut config = match ctx {
        Some(ctx) => LogConfig::from_section(&ctx.config.logging)?,
        None => LogConfig::default(),
    };
    if cli.verbose {
        config.level = LogLevel::Debug;
    }
    if let Some(format) = &cli.log_format {
        config.format = format.parse::<LogFormat>()?;
    }
    init_logging(&config)
}

#[cfg(feature = "cli")]
fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Init { force } = cli.command {
        setup_logging(cli, None)?;
        return Ok(handle_init(&cli.config_dir, force)?);
    }

    let ctx = CommandContext::load(&cli.config_dir)?;
    setup_logging(cli, Some(&ctx))?;

    let result: Result<(), CliError> = match &cli.command {
        Commands::Ingest {
            source,
            snapshot,
            json,
        } => {
            let args = IngestArgs {
                source: source.clone(),
                snapshot: snapshot.clone(),
                json: *json,
            };
            handle_ingest(&ctx, &args).map(|_| ())
        }
        Commands::Load { snapshot, json } => {
            let args = LoadArgs {
                snapshot: snapshot.clone(),
                json: *json,
            };
            handle_load(&ctx, &args).map(|_| ())
        }
        Commands::Run {
            source,
            snapshot,
            json,
        } => {
            let args = IngestArgs {
                source: source.clone(),
                snapshot: snapshot.clone(),
                json: *json,
            };
            handle_run(&ctx, &args).map(|_| ())
        }
        Commands::Status => handle_status(&ctx),
        Commands::Lookup { key, format } => handle_lookup(&ctx, key, format),
        Commands::Init { .. } => Ok(()),
    };

    Ok(result?)
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
