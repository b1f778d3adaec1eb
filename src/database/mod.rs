//! Analytical store abstraction and loader
//!
//! The pipeline writes its master record set through the [`RecordStore`]
//! contract. The DuckDB implementation keeps a single mutex-guarded embedded
//! connection; the [`loader`] drives additive schema evolution and batched
//! inserts against any implementation.

use serde::{Deserialize, Serialize};

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

pub mod loader;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbStore;

pub use loader::{LoadReport, SchemaEvolution, StoreLoader};
pub use schema::StoreSchema;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to the store
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema creation or evolution failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot could not be read
    #[error("Snapshot error: {0}")]
    SnapshotFailed(String),

    /// Worker pool could not be built
    #[error("Worker pool error: {0}")]
    PoolFailed(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store column types used by schema evolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Free text
    Text,
    /// Processing timestamp
    Timestamp,
}

impl ColumnType {
    /// Column type for an incoming column name
    pub fn for_column(name: &str) -> Self {
        if name.eq_ignore_ascii_case(crate::models::INGEST_TIMESTAMP_FIELD) {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }

    /// SQL type name
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "VARCHAR",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

/// Result of an add-column call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddColumnOutcome {
    Added,
    AlreadyExists,
}

/// Target store contract
///
/// Implementations must be safe to share across loader threads. Each
/// `insert_batch` call is all-or-nothing.
pub trait RecordStore: Send + Sync {
    /// Create the target table if it does not exist
    fn initialize(&self, table: &str) -> StoreResult<()>;

    /// Column names of the table in ordinal order
    fn describe_columns(&self, table: &str) -> StoreResult<Vec<String>>;

    /// Add a column; never removes or retypes existing ones
    fn add_column(
        &self,
        table: &str,
        name: &str,
        column_type: ColumnType,
    ) -> StoreResult<AddColumnOutcome>;

    /// Insert rows in one transaction, returning the inserted count
    ///
    /// Every row must hold one value per entry in `columns`.
    fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> StoreResult<usize>;

    /// Number of rows in the table
    fn row_count(&self, table: &str) -> StoreResult<u64>;

    /// Rows whose `canonical_key` equals `key`
    fn lookup(&self, table: &str, key: &str) -> StoreResult<QueryResult>;

    /// Backend type name
    fn backend_type(&self) -> &'static str;
}

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Output format for lookup results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(row: &QueryRow, col: &str, null: &str) -> String {
    match row.get(col).unwrap_or(&serde_json::Value::Null) {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => null.to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| {
                let s = cell_text(row, col, "");
                if s.contains(',') || s.contains('"') || s.contains('\n') {
                    format!("\"{}\"", s.replace('"', "\"\""))
                } else {
                    s
                }
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();

    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            widths[i] = widths[i].max(cell_text(row, col, "null").chars().count());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", cell_text(row, col, "null"), width = widths[i]))
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("CSV").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_column_type_for_column() {
        assert_eq!(
            ColumnType::for_column("ingest_timestamp"),
            ColumnType::Timestamp
        );
        assert_eq!(ColumnType::for_column("email"), ColumnType::Text);
        assert_eq!(ColumnType::Text.to_string(), "VARCHAR");
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["canonical_key".to_string(), "email".to_string()],
            vec![serde_json::json!({"canonical_key": "abc", "email": "ann@x.com"})],
        );

        let output = format_as_table(&result);
        assert!(output.starts_with("canonical_key | email"));
        assert!(output.contains("ann@x.com"));
        assert!(output.ends_with("(1 rows)"));
        assert_eq!(format_as_table(&QueryResult::empty()), "(0 rows)");
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["name".to_string(), "city".to_string()],
            vec![
                serde_json::json!({"name": "ann", "city": "Leeds"}),
                serde_json::json!({"name": "bob", "city": "York, UK"}),
                serde_json::json!({"name": "cy", "city": null}),
            ],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("name,city\n"));
        assert!(output.contains("ann,Leeds\n"));
        assert!(output.contains("bob,\"York, UK\"\n"));
        assert!(output.contains("cy,\n"));
    }
}
