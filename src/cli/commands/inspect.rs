//! `status`, `lookup` and `init` commands

use std::path::Path;

use super::CommandContext;
use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, PipelineConfig, sample_config};
use crate::database::{DuckDbStore, OutputFormat, RecordStore, format_query_result};

/// Print the store's columns and row count
pub fn handle_status(ctx: &CommandContext) -> Result<(), CliError> {
    let store = DuckDbStore::from_config(&ctx.config, &ctx.config_dir)?;
    let table = &ctx.config.database.table;

    println!("Backend: {}", store.backend_type());
    match store.db_path() {
        Some(path) => println!("Database: {}", path.display()),
        None => println!("Database: (in-memory)"),
    }

    let columns = store.describe_columns(table)?;
    if columns.is_empty() {
        println!("Table {} does not exist yet", table);
        return Ok(());
    }

    println!("Table: {}", table);
    println!("Rows: {}", store.row_count(table)?);
    println!("Columns ({}):", columns.len());
    for column in &columns {
        println!("  {}", column);
    }
    Ok(())
}

/// Print the record stored under one canonical key
pub fn handle_lookup(ctx: &CommandContext, key: &str, format: &str) -> Result<(), CliError> {
    let output_format: OutputFormat = format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;
    if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::InvalidArgument(format!(
            "Not a canonical key: {}",
            key
        )));
    }

    let store = DuckDbStore::from_config(&ctx.config, &ctx.config_dir)?;
    let result = store.lookup(&ctx.config.database.table, &key.to_ascii_lowercase())?;

    println!("{}", format_query_result(&result, output_format));
    if output_format != OutputFormat::Json {
        eprintln!("\nExecution time: {}ms", result.execution_time_ms);
    }
    Ok(())
}

/// Write a sample `.ingest.toml` into `config_dir`
pub fn handle_init(config_dir: &Path, force: bool) -> Result<(), CliError> {
    let path = config_dir.join(CONFIG_FILENAME);
    if PipelineConfig::exists(config_dir) && !force {
        return Err(CliError::InvalidArgument(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    std::fs::create_dir_all(config_dir)
        .map_err(|e| CliError::FileWriteError(config_dir.to_path_buf(), e.to_string()))?;
    std::fs::write(&path, sample_config())
        .map_err(|e| CliError::FileWriteError(path.clone(), e.to_string()))?;

    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_sample() {
        let dir = TempDir::new().unwrap();
        handle_init(dir.path(), false).unwrap();
        assert!(PipelineConfig::exists(dir.path()));
        assert!(PipelineConfig::load(dir.path()).is_ok());

        assert!(matches!(
            handle_init(dir.path(), false),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(handle_init(dir.path(), true).is_ok());
    }

    #[test]
    fn test_lookup_rejects_malformed_key() {
        let dir = TempDir::new().unwrap();
        let ctx = CommandContext::new(dir.path(), PipelineConfig::default());
        assert!(matches!(
            handle_lookup(&ctx, "not-a-key", "table"),
            Err(CliError::InvalidArgument(_))
        ));
        assert!(matches!(
            handle_lookup(&ctx, &"a".repeat(64), "yaml"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
