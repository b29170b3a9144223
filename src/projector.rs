//! Projection of a [`RawTable`] onto the target schema described by a
//! [`MappingSpec`].
//!
//! Column order of the result is the mapping's insertion order. Values are
//! coerced once here, to each field's declared type. A row with a cell that
//! cannot be coerced is rejected on its own; a bad column position or a bad
//! constant fails the whole file before any row is produced.

use log::{debug, warn};

use crate::{
    data::{FieldValue, coerce_raw, coerce_text},
    error::LoadError,
    mapping::{FieldSource, KEY_FIELD, MappingSpec},
    reader::RawTable,
};

const MAX_LOGGED_REJECTIONS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedTable {
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl ProjectedTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FieldValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Option<Vec<&FieldValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Reorders to `target` columns, filling absent ones with nulls. Returns the
    /// conformed table and the names of columns that were not part of `target`.
    pub fn conform_to(&self, target: &[&str]) -> (ProjectedTable, Vec<String>) {
        let sources: Vec<Option<usize>> = target.iter().map(|name| self.column_index(name)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|src| src.map_or(FieldValue::Null, |idx| row[idx].clone()))
                    .collect()
            })
            .collect();
        let dropped = self
            .columns
            .iter()
            .filter(|name| !target.contains(&name.as_str()))
            .cloned()
            .collect();
        let columns = target.iter().map(|name| name.to_string()).collect();
        (ProjectedTable { columns, rows }, dropped)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub input_rows: usize,
    /// Rows whose key field was null, blank or not mapped at all.
    pub dropped_empty_key: usize,
    /// Rows with at least one value that failed type coercion.
    pub rejected_rows: usize,
}

#[derive(Debug, Clone)]
pub struct Projection {
    pub table: ProjectedTable,
    pub stats: ProjectionStats,
}

enum Plan {
    Column(usize),
    Constant(FieldValue),
}

pub fn project(raw: &RawTable, mapping: &MappingSpec) -> Result<Projection, LoadError> {
    let plan = build_plan(raw, mapping)?;
    let key_idx = mapping.fields().iter().position(|f| f.name == KEY_FIELD);
    let mut stats = ProjectionStats {
        input_rows: raw.row_count(),
        ..ProjectionStats::default()
    };
    if key_idx.is_none() && raw.row_count() > 0 {
        warn!("Mapping has no '{KEY_FIELD}' field; all {} row(s) will be dropped", raw.row_count());
    }

    let mut rows = Vec::with_capacity(raw.row_count());
    for (row_idx, source) in raw.rows().iter().enumerate() {
        let mut projected = Vec::with_capacity(plan.len());
        let mut rejected = false;
        for (field, step) in mapping.fields().iter().zip(&plan) {
            let value = match step {
                Plan::Constant(value) => value.clone(),
                Plan::Column(idx) => match coerce_raw(&source[*idx], field.field_type) {
                    Ok(value) => value,
                    Err(err) => {
                        if stats.rejected_rows < MAX_LOGGED_REJECTIONS {
                            warn!(
                                "Row {} rejected: field '{}' ({}): {err:#}",
                                row_idx + 1,
                                field.name,
                                field.field_type
                            );
                        }
                        rejected = true;
                        break;
                    }
                },
            };
            projected.push(value);
        }
        if rejected {
            stats.rejected_rows += 1;
            continue;
        }
        match key_idx {
            Some(idx) if !projected[idx].is_blank() => rows.push(projected),
            _ => stats.dropped_empty_key += 1,
        }
    }

    if stats.rejected_rows > MAX_LOGGED_REJECTIONS {
        warn!(
            "{} more row(s) rejected for type errors",
            stats.rejected_rows - MAX_LOGGED_REJECTIONS
        );
    }
    debug!(
        "Projected {} of {} row(s) ({} without key, {} rejected)",
        rows.len(),
        stats.input_rows,
        stats.dropped_empty_key,
        stats.rejected_rows
    );
    Ok(Projection {
        table: ProjectedTable::new(mapping.column_names(), rows),
        stats,
    })
}

fn build_plan(raw: &RawTable, mapping: &MappingSpec) -> Result<Vec<Plan>, LoadError> {
    mapping
        .fields()
        .iter()
        .map(|field| match &field.source {
            FieldSource::Column(idx) if *idx >= raw.column_count() => {
                Err(LoadError::ColumnOutOfBounds {
                    field: field.name.clone(),
                    position: idx + 1,
                    column_count: raw.column_count(),
                })
            }
            FieldSource::Column(idx) => Ok(Plan::Column(*idx)),
            FieldSource::Constant(literal) => coerce_text(literal, field.field_type)
                .map(Plan::Constant)
                .map_err(|_| LoadError::InvalidConstant {
                    field: field.name.clone(),
                    value: literal.clone(),
                    field_type: field.field_type,
                }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{FieldType, RawValue},
        profile::FieldMappingRule,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn decimal(value: &str) -> FieldValue {
        FieldValue::Decimal(Decimal::from_str(value).unwrap())
    }

    #[test]
    fn drops_rows_with_empty_key() {
        let raw = RawTable::from_text_rows(&[&["A1", "10.5"], &["", "5.0"], &["B2", "7.25"]]);
        let mapping = MappingSpec::resolve(&[
            FieldMappingRule::indexed("DetailNum", "varchar(40)", 1),
            FieldMappingRule::indexed("DetailPrice", "numeric(18,2)", 2),
        ]);
        let projection = project(&raw, &mapping).unwrap();
        assert_eq!(
            projection.table.rows(),
            &[
                vec![FieldValue::text("A1"), decimal("10.5")],
                vec![FieldValue::text("B2"), decimal("7.25")],
            ]
        );
        assert_eq!(projection.stats.dropped_empty_key, 1);
        assert_eq!(projection.stats.input_rows, 3);
    }

    #[test]
    fn whitespace_key_counts_as_empty() {
        let raw = RawTable::from_text_rows(&[&["   "], &["\t"]]);
        let mapping = MappingSpec::resolve(&[FieldMappingRule::indexed("DetailNum", "varchar", 1)]);
        let projection = project(&raw, &mapping).unwrap();
        assert!(projection.table.is_empty());
        assert_eq!(projection.stats.dropped_empty_key, 2);
    }

    #[test]
    fn constants_are_broadcast() {
        let raw = RawTable::from_text_rows(&[&["A1"], &["B2"], &["C3"]]);
        let mapping = MappingSpec::resolve(&[
            FieldMappingRule::constant("Brand", "varchar(60)", "ACME"),
            FieldMappingRule::indexed("DetailNum", "varchar(40)", 1),
        ]);
        let projection = project(&raw, &mapping).unwrap();
        assert_eq!(projection.table.columns(), &["Brand", "DetailNum"]);
        let brands = projection.table.column_values("Brand").unwrap();
        assert_eq!(brands.len(), 3);
        assert!(brands.iter().all(|v| **v == FieldValue::text("ACME")));
    }

    #[test]
    fn out_of_bounds_column_fails_the_file() {
        let raw = RawTable::from_text_rows(&[&["A1", "1"]]);
        let mapping = MappingSpec::resolve(&[
            FieldMappingRule::indexed("DetailNum", "varchar", 1),
            FieldMappingRule::indexed("DetailPrice", "float", 3),
        ]);
        match project(&raw, &mapping) {
            Err(LoadError::ColumnOutOfBounds {
                field,
                position,
                column_count,
            }) => {
                assert_eq!(field, "DetailPrice");
                assert_eq!(position, 3);
                assert_eq!(column_count, 2);
            }
            other => panic!("expected column bounds error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_constant_fails_the_file() {
        let raw = RawTable::from_text_rows(&[&["A1"]]);
        let mapping = MappingSpec::resolve(&[
            FieldMappingRule::indexed("DetailNum", "varchar", 1),
            FieldMappingRule::constant("Quantity", "int", "lots"),
        ]);
        let err = project(&raw, &mapping).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidConstant {
                field_type: FieldType::Integer,
                ..
            }
        ));
    }

    #[test]
    fn coercion_failure_rejects_only_that_row() {
        let raw = RawTable::from_text_rows(&[&["A1", "12"], &["B2", "n/a"], &["C3", ""]]);
        let mapping = MappingSpec::resolve(&[
            FieldMappingRule::indexed("DetailNum", "varchar", 1),
            FieldMappingRule::indexed("Quantity", "int", 2),
        ]);
        let projection = project(&raw, &mapping).unwrap();
        assert_eq!(projection.stats.rejected_rows, 1);
        assert_eq!(
            projection.table.rows(),
            &[
                vec![FieldValue::text("A1"), FieldValue::Integer(12)],
                vec![FieldValue::text("C3"), FieldValue::Null],
            ]
        );
    }

    #[test]
    fn empty_mapping_yields_empty_table() {
        let raw = RawTable::from_text_rows(&[&["A1"], &["B2"]]);
        let projection = project(&raw, &MappingSpec::default()).unwrap();
        assert!(projection.table.columns().is_empty());
        assert!(projection.table.is_empty());
        assert_eq!(projection.stats.dropped_empty_key, 2);
    }

    #[test]
    fn numeric_key_from_spreadsheet_becomes_text() {
        let raw = RawTable::new(None, vec![vec![RawValue::Float(4711.0)]]);
        let mapping = MappingSpec::resolve(&[FieldMappingRule::indexed("DetailNum", "varchar", 1)]);
        let projection = project(&raw, &mapping).unwrap();
        assert_eq!(projection.table.rows()[0][0], FieldValue::text("4711"));
    }

    #[test]
    fn conform_fills_missing_and_reports_extra_columns() {
        let table = ProjectedTable::new(
            vec!["DetailNum".into(), "Supplier".into(), "Brand".into()],
            vec![vec![
                FieldValue::text("A1"),
                FieldValue::text("X"),
                FieldValue::text("ACME"),
            ]],
        );
        let (conformed, dropped) = table.conform_to(&["Brand", "DetailNum", "DetailPrice"]);
        assert_eq!(conformed.columns(), &["Brand", "DetailNum", "DetailPrice"]);
        assert_eq!(
            conformed.rows()[0],
            vec![FieldValue::text("ACME"), FieldValue::text("A1"), FieldValue::Null]
        );
        assert_eq!(dropped, vec!["Supplier".to_string()]);
    }
}
