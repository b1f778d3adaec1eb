//! Spreadsheet reader (xlsx, xls, xlsm, ods)
//!
//! Every sheet is read. The first row of a sheet is its header; every
//! following row is one record.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use chrono::Timelike;

use super::encoding::SourceEncoding;
use super::{ReadError, SourceReader};
use crate::models::{DropReason, RawRecord, RecordOutcome, Value};

/// Reader for workbook files
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetReader;

impl SourceReader for SpreadsheetReader {
    fn read(
        &self,
        path: &Path,
        _encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| ReadError::Corrupt(format!("Failed to open workbook: {}", e)))?;

        let mut outcomes = Vec::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let range = match workbook.worksheet_range(&sheet_name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable sheet '{}' in {}: {}",
                        sheet_name,
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            outcomes.extend(records_from_rows(range.rows()));
        }

        Ok(outcomes)
    }
}

/// Turn sheet rows into outcomes, using the first row as header
pub fn records_from_rows<'a, I>(mut rows: I) -> Vec<RecordOutcome>
where
    I: Iterator<Item = &'a [Data]>,
{
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_text(cell);
            if name.trim().is_empty() {
                format!("col_{}", i)
            } else {
                name.trim().to_string()
            }
        })
        .collect();

    rows.map(|row| {
        if row.iter().all(|cell| cell_text(cell).trim().is_empty()) {
            return RecordOutcome::Dropped(DropReason::EmptyRow);
        }
        let record: RawRecord = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let key = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("col_{}", i));
                (key, cell_value(cell))
            })
            .collect();
        RecordOutcome::Parsed(record)
    })
    .collect()
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(_) => Value::Null,
        other => Value::Text(cell_text(other)),
    }
}

/// Render a cell as text: ISO-8601 dates, integral floats without a fraction
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => crate::models::record::format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime)
                if datetime.num_seconds_from_midnight() == 0 && datetime.nanosecond() == 0 =>
            {
                datetime.format("%Y-%m-%d").to_string()
            }
            Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{Builder, TempDir};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    fn inline_cell(cell: &str, text: &str) -> String {
        format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, cell, text)
    }

    /// Date cell using the built-in `m/d/yyyy` style at index 1
    fn date_cell(cell: &str, serial: u32) -> String {
        format!(r#"<c r="{}" s="1"><v>{}</v></c>"#, cell, serial)
    }

    fn worksheet_xml(rows: &[Vec<String>]) -> String {
        let rows: String = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| format!(r#"<row r="{}">{}</row>"#, i + 1, cells.concat()))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
            MAIN_NS, rows
        )
    }

    /// Write a minimal xlsx package with one worksheet per entry
    fn write_xlsx(path: &Path, sheets: &[(&str, String)]) {
        let mut parts: Vec<(String, String)> = Vec::new();

        let overrides: String = (1..=sheets.len())
            .map(|i| {
                format!(
                    r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                    i
                )
            })
            .collect();
        parts.push((
            "[Content_Types].xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{}</Types>"#,
                overrides
            ),
        ));
        parts.push((
            "_rels/.rels".into(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.into(),
        ));

        let sheet_entries: String = sheets
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#, name, i + 1, i + 1)
            })
            .collect();
        parts.push((
            "xl/workbook.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{}" xmlns:r="{}"><sheets>{}</sheets></workbook>"#,
                MAIN_NS, REL_NS, sheet_entries
            ),
        ));

        let mut relationships: String = (1..=sheets.len())
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                    i, REL_NS, i
                )
            })
            .collect();
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{}/styles" Target="styles.xml"/>"#,
            sheets.len() + 1,
            REL_NS
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
                relationships
            ),
        ));

        parts.push((
            "xl/styles.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="{}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#,
                MAIN_NS
            ),
        ));

        for (i, (_, xml)) in sheets.iter().enumerate() {
            parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml.clone()));
        }

        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_reads_every_sheet_of_workbook() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.xlsx");
        let staff = worksheet_xml(&[
            vec![inline_cell("A1", "Name"), inline_cell("B1", "Joined")],
            vec![inline_cell("A2", "Ann"), date_cell("B2", 45352)],
            vec![inline_cell("A3", "Bob"), date_cell("B3", 45292)],
        ]);
        let contractors = worksheet_xml(&[
            vec![inline_cell("A1", "Name"), inline_cell("B1", "Agency")],
            vec![inline_cell("A2", "Cara"), inline_cell("B2", "Acme")],
        ]);
        write_xlsx(&path, &[("Staff", staff), ("Contractors", contractors)]);

        let outcomes = SpreadsheetReader.read(&path, SourceEncoding::Utf8).unwrap();
        assert_eq!(outcomes.len(), 3);

        let ann = outcomes[0].record().unwrap();
        assert_eq!(ann.get("Name"), Some(&Value::from("Ann")));
        assert_eq!(ann.get("Joined"), Some(&Value::from("2024-03-01")));
        let bob = outcomes[1].record().unwrap();
        assert_eq!(bob.get("Joined"), Some(&Value::from("2024-01-01")));

        let cara = outcomes[2].record().unwrap();
        assert_eq!(cara.get("Name"), Some(&Value::from("Cara")));
        assert_eq!(cara.get("Agency"), Some(&Value::from("Acme")));
        assert!(cara.get("Joined").is_none());
    }

    #[test]
    fn test_header_row_and_records() {
        let rows: Vec<Vec<Data>> = vec![
            vec![
                Data::String("Name".into()),
                Data::Empty,
                Data::String("Age".into()),
            ],
            vec![
                Data::String("Ann".into()),
                Data::String("x".into()),
                Data::Float(42.0),
            ],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![Data::String("Bob".into()), Data::Empty, Data::Int(7)],
        ];
        let outcomes = records_from_rows(rows.iter().map(Vec::as_slice));
        assert_eq!(outcomes.len(), 3);

        let ann = outcomes[0].record().unwrap();
        assert_eq!(ann.get("Name"), Some(&Value::from("Ann")));
        assert_eq!(ann.get("col_1"), Some(&Value::from("x")));
        assert_eq!(ann.get("Age"), Some(&Value::Float(42.0)));
        assert_eq!(ann.get("Age").unwrap().to_field_string(), "42");

        assert_eq!(outcomes[1], RecordOutcome::Dropped(DropReason::EmptyRow));
        assert_eq!(outcomes[2].record().unwrap().get("col_1"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_sheet() {
        let rows: Vec<Vec<Data>> = Vec::new();
        assert!(records_from_rows(rows.iter().map(Vec::as_slice)).is_empty());
    }

    #[test]
    fn test_iso_strings_pass_through() {
        assert_eq!(
            cell_text(&Data::DateTimeIso("2024-03-01T10:00:00".into())),
            "2024-03-01T10:00:00"
        );
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
    }

    #[test]
    fn test_broken_workbook_is_corrupt() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"this is not a zip archive").unwrap();
        let result = SpreadsheetReader.read(file.path(), SourceEncoding::Utf8);
        assert!(matches!(result, Err(ReadError::Corrupt(_))));
    }
}
