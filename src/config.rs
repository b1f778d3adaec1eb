//! Pipeline configuration file support
//!
//! Handles parsing of `.ingest.toml` configuration files and
//! environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validation::input::validate_table_name;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".ingest.toml";

/// Default directory scanned for source files
pub const DEFAULT_SOURCE_DIR: &str = "data_raw";

/// Default snapshot directory
pub const DEFAULT_SNAPSHOT_DIR: &str = "data_processed/master_dataset";

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = "master.duckdb";

/// Default target table
pub const DEFAULT_TABLE: &str = "master_records";

/// Default rows per insert batch
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Environment variable for the source directory
pub const ENV_SOURCE_DIR: &str = "INGEST_SOURCE_DIR";

/// Environment variable for the snapshot directory
pub const ENV_SNAPSHOT_DIR: &str = "INGEST_SNAPSHOT_DIR";

/// Environment variable for DuckDB path
pub const ENV_DUCKDB_PATH: &str = "INGEST_DUCKDB_PATH";

/// Environment variable for the target table
pub const ENV_TABLE: &str = "INGEST_TABLE";

/// Environment variable for the insert batch size
pub const ENV_BATCH_SIZE: &str = "INGEST_BATCH_SIZE";

/// Environment variable for the worker thread count
pub const ENV_WORKERS: &str = "INGEST_WORKERS";

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Config error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendType {
    /// DuckDB database file (default)
    #[default]
    DuckDB,
    /// In-memory DuckDB, discarded at exit
    Memory,
}

impl std::str::FromStr for StoreBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(StoreBackendType::DuckDB),
            "memory" | "in-memory" => Ok(StoreBackendType::Memory),
            _ => Err(format!(
                "Unknown store backend: {}. Use 'duckdb' or 'memory'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for StoreBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackendType::DuckDB => write!(f, "duckdb"),
            StoreBackendType::Memory => write!(f, "memory"),
        }
    }
}

/// Source discovery section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Directory holding source files (relative to the config directory, or absolute)
    #[serde(default = "default_source_dir")]
    pub dir: String,

    /// Glob pattern matched against file names inside `dir`
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Bytes sampled for charset detection
    #[serde(default = "default_encoding_sample_size")]
    pub encoding_sample_size: usize,
}

fn default_source_dir() -> String {
    DEFAULT_SOURCE_DIR.to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

fn default_encoding_sample_size() -> usize {
    crate::import::encoding::DEFAULT_SAMPLE_SIZE
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            dir: default_source_dir(),
            pattern: default_pattern(),
            encoding_sample_size: default_encoding_sample_size(),
        }
    }
}

/// Snapshot output section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory the Parquet snapshot is written to (replaced on every run)
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

fn default_snapshot_dir() -> String {
    DEFAULT_SNAPSHOT_DIR.to_string()
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

/// Data quality section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySection {
    /// Cap on stored value length, in characters
    #[serde(default = "default_max_value_length")]
    pub max_value_length: usize,

    /// Fields that must be present and non-empty after normalization
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Re-split misaligned delimited rows into `col_<i>` fields instead of dropping them
    #[serde(default = "default_true")]
    pub positional_recovery: bool,
}

fn default_max_value_length() -> usize {
    crate::validation::quality::MAX_VALUE_LENGTH
}

fn default_true() -> bool {
    true
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            max_value_length: default_max_value_length(),
            required_fields: Vec::new(),
            positional_recovery: true,
        }
    }
}

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Store backend type
    #[serde(default)]
    pub backend: StoreBackendType,

    /// Path to DuckDB database file (relative to the config directory, or absolute)
    #[serde(default = "default_duckdb_path")]
    pub path: String,

    /// Target table
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            backend: StoreBackendType::default(),
            path: default_duckdb_path(),
            table: default_table(),
        }
    }
}

/// Loader section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSection {
    /// Rows per insert batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Snapshot files loaded in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    1
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

/// Worker pool section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkersSection {
    /// Threads for per-file processing (0 = available cores)
    #[serde(default)]
    pub threads: usize,

    /// Show a progress bar while files are processed
    #[serde(default)]
    pub progress: bool,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.ingest.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub quality: QualitySection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub loader: LoaderSection,

    #[serde(default)]
    pub workers: WorkersSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl PipelineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a directory
    ///
    /// Looks for `.ingest.toml` in the directory.
    /// Falls back to defaults if not found.
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a directory
    pub fn save(&self, config_dir: &Path) -> ConfigResult<()> {
        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = self.to_toml()?;

        std::fs::write(&config_path, content)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_SOURCE_DIR) {
            self.source.dir = dir;
        }

        if let Some(dir) = lookup(ENV_SNAPSHOT_DIR) {
            self.output.snapshot_dir = dir;
        }

        if let Some(path) = lookup(ENV_DUCKDB_PATH) {
            self.database.path = path;
        }

        if let Some(table) = lookup(ENV_TABLE) {
            self.database.table = table;
        }

        if let Some(size) = lookup(ENV_BATCH_SIZE)
            && let Ok(size) = size.parse()
        {
            self.loader.batch_size = size;
        }

        if let Some(threads) = lookup(ENV_WORKERS)
            && let Ok(threads) = threads.parse()
        {
            self.workers.threads = threads;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.loader.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "loader.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.loader.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "loader.concurrency must be greater than zero".to_string(),
            ));
        }
        if self.quality.max_value_length == 0 {
            return Err(ConfigError::Invalid(
                "quality.max_value_length must be greater than zero".to_string(),
            ));
        }
        validate_table_name(&self.database.table)
            .map_err(|e| ConfigError::Invalid(format!("database.table: {}", e)))?;
        glob::Pattern::new(&self.source.pattern)
            .map_err(|e| ConfigError::Invalid(format!("source.pattern: {}", e)))?;
        Ok(())
    }

    /// Source directory resolved against the config directory
    pub fn source_dir(&self, config_dir: &Path) -> PathBuf {
        resolve(config_dir, &self.source.dir)
    }

    /// Snapshot directory resolved against the config directory
    pub fn snapshot_dir(&self, config_dir: &Path) -> PathBuf {
        resolve(config_dir, &self.output.snapshot_dir)
    }

    /// Get the DuckDB database path resolved against the config directory
    pub fn get_duckdb_path(&self, config_dir: &Path) -> PathBuf {
        if self.database.path.is_empty() {
            config_dir.join(DEFAULT_DUCKDB_FILENAME)
        } else {
            resolve(config_dir, &self.database.path)
        }
    }

    /// Check if configuration exists in a directory
    pub fn exists(config_dir: &Path) -> bool {
        config_dir.join(CONFIG_FILENAME).exists()
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        base.join(path)
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# unified-ingest configuration

[source]
# Directory holding source files (relative to this file, or absolute)
dir = "data_raw"

# Glob pattern for file names inside the source directory
pattern = "*"

# Bytes sampled for character encoding detection
encoding_sample_size = 10000

[output]
# Parquet snapshot of the deduplicated record set (replaced on every run)
snapshot_dir = "data_processed/master_dataset"

[quality]
# Stored values are capped at this many characters
max_value_length = 10000

# Records missing any of these (after normalization) are dropped
required_fields = []

# Re-split misaligned CSV rows into col_0, col_1, ... instead of dropping them
positional_recovery = true

[database]
# Store backend: "duckdb" (default) or "memory"
backend = "duckdb"

# Path to DuckDB database file (relative to this file, or absolute)
path = "master.duckdb"

# Target table
table = "master_records"

[loader]
# Rows per insert batch; a failed batch is skipped and counted
batch_size = 50000

# Snapshot files loaded in parallel
concurrency = 1

[workers]
# Threads for per-file processing (0 = all cores)
threads = 0

# Show a progress bar while files are processed
progress = false

[logging]
# Default level when RUST_LOG is unset
level = "info"

# "text" or "json"
format = "text"
"#
}
