//! CLI command implementations

pub mod ingest;
pub mod inspect;
pub mod load;

use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::config::PipelineConfig;

/// Configuration shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Directory holding `.ingest.toml`; relative paths resolve against it
    pub config_dir: PathBuf,
    pub config: PipelineConfig,
}

impl CommandContext {
    /// Load `.ingest.toml` (or defaults) from `config_dir`
    pub fn load(config_dir: &Path) -> Result<Self, CliError> {
        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            config: PipelineConfig::load(config_dir)?,
        })
    }

    /// Wrap an already loaded configuration
    pub fn new(config_dir: &Path, config: PipelineConfig) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            config,
        }
    }

    pub fn source_dir(&self, overridden: Option<&Path>) -> PathBuf {
        overridden
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.source_dir(&self.config_dir))
    }

    pub fn snapshot_dir(&self, overridden: Option<&Path>) -> PathBuf {
        overridden
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.snapshot_dir(&self.config_dir))
    }
}

/// Print a serializable value as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
