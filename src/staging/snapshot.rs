//! Parquet snapshot of the master record set
//!
//! The snapshot directory is replaced wholesale on every run and holds one
//! `part-00000.parquet` file with every column stored as UTF-8.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use super::error::StagingError;
use super::merge::MasterRecordSet;

/// File name of the single snapshot part
pub const SNAPSHOT_FILE: &str = "part-00000.parquet";

/// Write the master set, replacing any previous snapshot in `dir`
pub fn write_snapshot(dir: &Path, master: &MasterRecordSet) -> Result<PathBuf, StagingError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| StagingError::snapshot(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| StagingError::snapshot(dir, e))?;

    let path = dir.join(SNAPSHOT_FILE);
    let schema = Arc::new(Schema::new(
        master
            .columns
            .iter()
            .map(|c| Field::new(c, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = (0..master.columns.len())
        .map(|i| {
            let values = master
                .rows
                .iter()
                .map(|row| row.get(i).map(String::as_str).unwrap_or(""));
            Arc::new(StringArray::from_iter_values(values)) as ArrayRef
        })
        .collect();
    let batch =
        RecordBatch::try_new(schema.clone(), arrays).map_err(|e| StagingError::snapshot(&path, e))?;

    let file = File::create(&path).map_err(|e| StagingError::snapshot(&path, e))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).map_err(|e| StagingError::snapshot(&path, e))?;
    writer
        .write(&batch)
        .map_err(|e| StagingError::snapshot(&path, e))?;
    writer.close().map_err(|e| StagingError::snapshot(&path, e))?;

    info!(path = %path.display(), rows = master.len(), columns = master.columns.len(), "Snapshot written");
    Ok(path)
}

/// Parquet files of a snapshot directory, in path order
pub fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, StagingError> {
    let entries = fs::read_dir(dir).map_err(|e| StagingError::snapshot(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read one snapshot file back as text columns; nulls become empty strings
pub fn read_snapshot(path: &Path) -> Result<MasterRecordSet, StagingError> {
    let file = File::open(path).map_err(|e| StagingError::snapshot(path, e))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| StagingError::snapshot(path, e))?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().map_err(|e| StagingError::snapshot(path, e))?;

    let options = FormatOptions::default();
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| StagingError::snapshot(path, e))?;
        let formatters = batch
            .columns()
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StagingError::snapshot(path, e))?;

        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .zip(formatters.iter())
                    .map(|(column, formatter)| {
                        if column.is_null(row) {
                            String::new()
                        } else {
                            formatter.value(row).to_string()
                        }
                    })
                    .collect(),
            );
        }
    }

    Ok(MasterRecordSet { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> MasterRecordSet {
        MasterRecordSet {
            columns: vec![
                "canonical_key".to_string(),
                "email".to_string(),
                "ingest_timestamp".to_string(),
            ],
            rows: vec![
                vec!["k1".into(), "a@x".into(), "2024-05-01 12:30:00.000000".into()],
                vec!["k2".into(), "".into(), "2024-05-01 12:30:00.000000".into()],
            ],
        }
    }

    #[test]
    fn test_snapshot_write_and_read() {
        let dir = TempDir::new().unwrap();
        let snapshot_dir = dir.path().join("master_dataset");

        let path = write_snapshot(&snapshot_dir, &sample()).unwrap();
        assert_eq!(path.file_name().unwrap(), SNAPSHOT_FILE);
        assert_eq!(read_snapshot(&path).unwrap(), sample());
    }

    #[test]
    fn test_snapshot_overwrites_directory() {
        let dir = TempDir::new().unwrap();
        let snapshot_dir = dir.path().join("master_dataset");
        fs::create_dir_all(&snapshot_dir).unwrap();
        fs::write(snapshot_dir.join("part-00001.parquet"), b"stale").unwrap();

        write_snapshot(&snapshot_dir, &sample()).unwrap();
        let files = snapshot_files(&snapshot_dir).unwrap();
        assert_eq!(files, vec![snapshot_dir.join(SNAPSHOT_FILE)]);
    }

    #[test]
    fn test_empty_master_set_round_trips_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_snapshot(dir.path(), &MasterRecordSet::default()).unwrap();
        let read = read_snapshot(&path).unwrap();
        assert!(read.is_empty());
        assert_eq!(read.columns, MasterRecordSet::default().columns);
    }
}
