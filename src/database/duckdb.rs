//! DuckDB store implementation
//!
//! Embedded analytical store holding the master record table. Supports both
//! file-based persistence and in-memory mode.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::StoreSchema;
use super::{AddColumnOutcome, ColumnType, QueryResult, RecordStore, StoreError, StoreResult};
use crate::config::{PipelineConfig, StoreBackendType};

/// DuckDB record store
///
/// One connection per store, serialized behind a mutex. The store is passed
/// by reference to the loader and closed when dropped.
pub struct DuckDbStore {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDbStore {
    /// Open or create a file-based store
    pub fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory store
    pub fn in_memory() -> StoreResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StoreError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Open the store described by a configuration
    pub fn from_config(config: &PipelineConfig, config_dir: &Path) -> StoreResult<Self> {
        match config.database.backend {
            StoreBackendType::DuckDB => Self::new(config.get_duckdb_path(config_dir)),
            StoreBackendType::Memory => Self::in_memory(),
        }
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| StoreError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    fn columns_of(conn: &duckdb::Connection, table: &str) -> StoreResult<Vec<String>> {
        let mut stmt = conn
            .prepare(StoreSchema::describe_columns_sql())
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::QueryFailed(format!("Query failed: {}", e)))?;

        names
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::QueryFailed(format!("Row fetch error: {}", e)))
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Timestamp(unit, raw) => timestamp_to_json(unit, raw)
                .unwrap_or_else(|| serde_json::Value::String(format!("{:?}", value))),
            ValueRef::Decimal(d) => serde_json::Value::String(d.to_string()),
            _ => serde_json::Value::String(format!("{:?}", value)),
        }
    }
}

/// Render a stored timestamp in the same layout the pipeline writes
fn timestamp_to_json(unit: duckdb::types::TimeUnit, raw: i64) -> Option<serde_json::Value> {
    let micros = unit.to_micros(raw);
    chrono::DateTime::<chrono::Utc>::from_timestamp_micros(micros)
        .map(|t| crate::transform::format_ingest_timestamp(&t).into())
}

impl RecordStore for DuckDbStore {
    fn initialize(&self, table: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&StoreSchema::create_table_sql(table))
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to create {}: {}", table, e))
            })?;
        tracing::debug!(table, "Store table ready");
        Ok(())
    }

    fn describe_columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        Self::columns_of(&conn, table)
    }

    fn add_column(
        &self,
        table: &str,
        name: &str,
        column_type: ColumnType,
    ) -> StoreResult<AddColumnOutcome> {
        let conn = self.lock()?;

        // DuckDB identifiers are case-insensitive
        let existing = Self::columns_of(&conn, table)?;
        if existing.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            return Ok(AddColumnOutcome::AlreadyExists);
        }

        conn.execute(
            &StoreSchema::add_column_sql(table, name, column_type.sql_type()),
            [],
        )
        .map_err(|e| StoreError::MigrationFailed(format!("Failed to add column {}: {}", name, e)))?;

        Ok(AddColumnOutcome::Added)
    }

    fn insert_batch(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<String>],
    ) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(StoreError::InvalidInput(format!(
                "Row {} has {} values for {} columns",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::TransactionFailed(format!("Begin failed: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(&StoreSchema::insert_sql(table, columns))
                .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;
            for row in rows {
                stmt.execute(duckdb::params_from_iter(row.iter()))
                    .map_err(|e| StoreError::QueryFailed(format!("Insert failed: {}", e)))?;
            }
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()
            .map_err(|e| StoreError::TransactionFailed(format!("Commit failed: {}", e)))?;

        Ok(rows.len())
    }

    fn row_count(&self, table: &str) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&StoreSchema::count_sql(table), [], |row| row.get(0))
            .map_err(|e| StoreError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    fn lookup(&self, table: &str, key: &str) -> StoreResult<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&StoreSchema::lookup_sql(table))
            .map_err(|e| StoreError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, the query runs before column names are known
        let mut result_rows = stmt
            .query([key])
            .map_err(|e| StoreError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| StoreError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}
