use std::fmt::Write as _;

use crate::{io_utils::flatten_control_chars, projector::ProjectedTable};

/// Renders `headers` and `rows` as left-aligned columns separated by two spaces.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

/// Renders at most `limit` rows of a projection; nulls show as `NULL`.
pub fn render_projection(table: &ProjectedTable, limit: usize) -> String {
    let rows = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| row.iter().map(|value| value.to_string()).collect())
        .collect::<Vec<Vec<String>>>();
    render_table(table.columns(), &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (value, width) in values.iter().zip(widths) {
        let sanitized = flatten_control_chars(value);
        let padding = width.saturating_sub(display_width(&sanitized));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}
