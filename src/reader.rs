//! Loads one vendor file into a [`RawTable`].

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::debug;

use crate::{data::RawValue, io_utils, profile::FileKind};

/// Rows by source columns, exactly as read. Short rows are padded with
/// [`RawValue::Empty`] so every row has `column_count` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Option<Vec<String>>,
    rows: Vec<Vec<RawValue>>,
    column_count: usize,
}

impl RawTable {
    pub fn new(headers: Option<Vec<String>>, mut rows: Vec<Vec<RawValue>>) -> Self {
        let widest_row = rows.iter().map(Vec::len).max().unwrap_or(0);
        let column_count = headers.as_ref().map_or(0, Vec::len).max(widest_row);
        for row in &mut rows {
            row.resize(column_count, RawValue::Empty);
        }
        Self {
            headers,
            rows,
            column_count,
        }
    }

    /// Convenience constructor from text cells; empty strings become empty cells.
    pub fn from_text_rows(rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| RawValue::from(*cell)).collect())
            .collect();
        Self::new(None, rows)
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub kind: FileKind,
    pub delimiter: u8,
    pub has_header: bool,
    pub encoding: &'static Encoding,
}

pub fn read_table(path: &Path, options: &ReadOptions) -> Result<RawTable> {
    let table = match options.kind {
        FileKind::Delimited => read_delimited(path, options)?,
        FileKind::Spreadsheet => read_spreadsheet(path, options.has_header)?,
    };
    debug!(
        "Read {} row(s) x {} column(s) from {:?}",
        table.row_count(),
        table.column_count(),
        path
    );
    Ok(table)
}

fn read_delimited(path: &Path, options: &ReadOptions) -> Result<RawTable> {
    let mut reader =
        io_utils::open_csv_reader_from_path(path, options.delimiter, options.has_header)?;
    let headers = if options.has_header {
        Some(io_utils::reader_headers(&mut reader, options.encoding)?)
    } else {
        None
    };
    let first_data_line = if options.has_header { 2 } else { 1 };
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let line = idx + first_data_line;
        let record = record.with_context(|| format!("Reading row {line}"))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {line}"))?;
        rows.push(
            decoded
                .iter()
                .map(|cell| RawValue::from(cell.as_str()))
                .collect(),
        );
    }
    Ok(RawTable::new(headers, rows))
}

fn read_spreadsheet(path: &Path, has_header: bool) -> Result<RawTable> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook {path:?} has no sheets"))?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .with_context(|| format!("Reading sheet '{first_sheet}'"))?;

    // The used range may start right of column A; keep positions absolute.
    let leading_columns = range.start().map_or(0, |(_, col)| col as usize);
    let mut rows = range.rows().map(|row| {
        let mut cells = vec![RawValue::Empty; leading_columns];
        cells.extend(row.iter().map(cell_to_raw));
        cells
    });
    let headers = if has_header {
        rows.next()
            .map(|row| row.iter().map(RawValue::as_display).collect::<Vec<_>>())
    } else {
        None
    };
    Ok(RawTable::new(headers, rows.collect()))
}

fn cell_to_raw(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) if s.is_empty() => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Int(i) => RawValue::Integer(*i),
        Data::Float(f) => RawValue::Float(*f),
        Data::Bool(b) => RawValue::Boolean(*b),
        Data::DateTime(dt) => RawValue::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(_) => RawValue::Empty,
    }
}
