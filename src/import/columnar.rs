//! Parquet reader
//!
//! Every cell is rendered to text with Arrow's display formatting; nulls stay null.

use std::fs::File;
use std::path::Path;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::encoding::SourceEncoding;
use super::{ReadError, SourceReader};
use crate::models::{RawRecord, RecordOutcome, Value};

/// Reader for Parquet files
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnarReader;

impl SourceReader for ColumnarReader {
    fn read(
        &self,
        path: &Path,
        _encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|builder| builder.build())
            .map_err(|e| ReadError::Corrupt(format!("Failed to open Parquet file: {}", e)))?;

        let mut outcomes = Vec::new();
        for batch in reader {
            let batch =
                batch.map_err(|e| ReadError::Corrupt(format!("Failed to read row group: {}", e)))?;
            outcomes.extend(batch_records(&batch)?);
        }

        Ok(outcomes)
    }
}

fn batch_records(batch: &RecordBatch) -> Result<Vec<RecordOutcome>, ReadError> {
    let schema = batch.schema();
    let options = FormatOptions::default();
    let formatters = batch
        .columns()
        .iter()
        .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ReadError::Parse(format!("Unsupported column type: {}", e)))?;

    let records = (0..batch.num_rows())
        .map(|row| {
            let record: RawRecord = schema
                .fields()
                .iter()
                .zip(batch.columns().iter().zip(formatters.iter()))
                .map(|(field, (column, formatter))| {
                    let value = if column.is_null(row) {
                        Value::Null
                    } else {
                        Value::Text(formatter.value(row).to_string())
                    };
                    (field.name().clone(), value)
                })
                .collect();
            RecordOutcome::Parsed(record)
        })
        .collect();

    Ok(records)
}
