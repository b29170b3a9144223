//! UTF-16 text for the ODBC wide-character bindings.
//!
//! Narrow ODBC text is read in the client's codepage, which on Windows is not
//! UTF-8, so every value crosses the driver boundary as UTF-16.

use crate::data::FieldValue;

/// A batch of rows converted to UTF-16 cells, column-major widths included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideRows {
    /// Row-major cells; `None` binds as SQL NULL.
    pub cells: Vec<Vec<Option<Vec<u16>>>>,
    /// Longest cell per column in UTF-16 code units, at least 1.
    pub max_lengths: Vec<usize>,
}

pub fn encode_rows(column_count: usize, rows: &[Vec<FieldValue>]) -> WideRows {
    let mut max_lengths = vec![1; column_count];
    let cells = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(column_count)
                .enumerate()
                .map(|(col, value)| {
                    let units = value
                        .as_sql_text()
                        .map(|text| text.encode_utf16().collect::<Vec<u16>>());
                    if let Some(units) = &units {
                        max_lengths[col] = max_lengths[col].max(units.len());
                    }
                    units
                })
                .collect()
        })
        .collect();
    WideRows { cells, max_lengths }
}

pub fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}
