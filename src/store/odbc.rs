//! SQL Server access over ODBC.
//!
//! Text is bound and fetched as UTF-16 (see [`super::wide`]); statement text
//! goes through the driver manager's wide entry points on Windows.

use std::{path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use odbc_api::{
    Connection, ConnectionOptions, Cursor, Environment, ParameterCollectionRef, ResultSetMetadata,
    buffers::{BufferDesc, ColumnarAnyBuffer},
};

use super::{ClearMode, PriceSink, ProfileSource, wide};
use crate::{
    config::LoaderConfig,
    data::FieldValue,
    error::LoadError,
    profile::{FieldMappingRule, FileKind, MappingProfile},
};

const FETCH_BATCH_ROWS: usize = 256;
const MAX_TEXT_LEN: usize = 4096;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().context("Allocating ODBC environment")?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

pub struct OdbcStore {
    connection: Connection<'static>,
    target_table: String,
    recompute_procedure: String,
    mapping_type_id: i32,
}

impl OdbcStore {
    pub fn connect(config: &LoaderConfig) -> Result<Self, LoadError> {
        let connection_string = config.connection.odbc_connection_string()?;
        let connection = environment()
            .and_then(|env| {
                env.connect_with_connection_string(&connection_string, ConnectionOptions::default())
                    .context("Opening ODBC connection")
            })
            .map_err(|cause| LoadError::StoreConnection { cause })?;
        info!(
            "Connected to {}",
            config
                .connection
                .server
                .as_deref()
                .unwrap_or("the configured data source")
        );
        Ok(Self {
            connection,
            target_table: config.target_table.clone(),
            recompute_procedure: config.recompute_procedure.clone(),
            mapping_type_id: config.mapping_type_id,
        })
    }

    /// Runs a query and returns every cell as text, fetched through UTF-16 buffers.
    fn query_text(
        &self,
        sql: &str,
        params: impl ParameterCollectionRef,
    ) -> Result<Vec<Vec<Option<String>>>> {
        let Some(mut cursor) = self
            .connection
            .execute(sql, params, None)
            .with_context(|| format!("Executing {sql}"))?
        else {
            return Ok(Vec::new());
        };
        let column_count = usize::try_from(cursor.num_result_cols()?).unwrap_or(0);
        let descs = (0..column_count).map(|_| BufferDesc::WText {
            max_str_len: MAX_TEXT_LEN,
        });
        let buffers = ColumnarAnyBuffer::from_descs(FETCH_BATCH_ROWS, descs);
        let mut row_set_cursor = cursor.bind_buffer(buffers)?;
        let mut rows = Vec::new();
        while let Some(batch) = row_set_cursor.fetch()? {
            let views = (0..column_count)
                .map(|col| {
                    batch
                        .column(col)
                        .as_w_text_view()
                        .ok_or_else(|| anyhow!("Column {} is not bound as wide text", col + 1))
                })
                .collect::<Result<Vec<_>>>()?;
            for row in 0..batch.num_rows() {
                rows.push(
                    views
                        .iter()
                        .map(|view| view.get(row).map(wide::decode))
                        .collect(),
                );
            }
        }
        Ok(rows)
    }

    fn exec(&self, sql: &str) -> Result<()> {
        debug!("Executing: {sql}");
        self.connection
            .execute(sql, (), None)
            .with_context(|| format!("Executing {sql}"))?;
        Ok(())
    }
}

fn cell(row: &[Option<String>], idx: usize) -> Option<&str> {
    row.get(idx).and_then(|v| v.as_deref())
}

fn parse_int<T: std::str::FromStr>(row: &[Option<String>], idx: usize, column: &str) -> Result<T> {
    let raw = cell(row, idx).ok_or_else(|| anyhow!("{column} is NULL"))?;
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{column} value '{raw}' is not an integer"))
}

impl ProfileSource for OdbcStore {
    fn list_active_profiles(&mut self) -> Result<Vec<MappingProfile>> {
        let sql = "SELECT m.MappingProfileID, m.FileTypeID, m.FilePath, \
                          d.Brief AS DelimiterBrief, d.Name AS DelimiterName, m.Flag \
                     FROM tMappingProfiles m WITH (NOLOCK) \
                     LEFT JOIN tDelimiter d WITH (NOLOCK) ON d.DelimiterID = m.DelimiterID \
                    WHERE m.MappingTypeID = ? AND m.isActive = 1";
        let rows = self.query_text(sql, &self.mapping_type_id)?;
        rows.iter()
            .map(|row| {
                Ok(MappingProfile {
                    id: parse_int(row, 0, "MappingProfileID")?,
                    file_kind: FileKind::from_type_id(parse_int(row, 1, "FileTypeID")?),
                    path_pattern: cell(row, 2)
                        .ok_or_else(|| anyhow!("FilePath is NULL"))?
                        .to_string(),
                    delimiter: cell(row, 3).map(str::to_string),
                    delimiter_name: cell(row, 4).map(str::to_string),
                    flags: parse_int::<i32>(row, 5, "Flag").unwrap_or(0),
                    active: true,
                })
            })
            .collect()
    }

    fn list_field_rules(&mut self, profile_id: i64) -> Result<Vec<FieldMappingRule>> {
        let sql = "SELECT f.Brief AS FieldBrief, f.DataType AS FieldDataType, \
                          t.DataType, t.DataValue \
                     FROM tMappingFields t WITH (NOLOCK) \
                     LEFT JOIN tFields f WITH (NOLOCK) ON f.FieldID = t.FieldID \
                    WHERE t.MappingProfileID = ?";
        let rows = self.query_text(sql, &profile_id)?;
        rows.iter()
            .map(|row| {
                Ok(FieldMappingRule {
                    target_field: cell(row, 0).unwrap_or_default().to_string(),
                    declared_type: cell(row, 1).map(str::to_string),
                    kind: parse_int(row, 2, "DataType")?,
                    value: cell(row, 3).map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Reading field rules of profile {profile_id}"))
    }
}

impl PriceSink for OdbcStore {
    fn clear_target(&mut self, mode: ClearMode) -> Result<()> {
        let sql = match mode {
            ClearMode::Delete => format!("DELETE FROM {}", self.target_table),
            ClearMode::Truncate => format!("SET NOCOUNT ON; TRUNCATE TABLE {};", self.target_table),
        };
        self.exec(&sql)
    }

    fn insert_batch(&mut self, columns: &[String], rows: &[Vec<FieldValue>]) -> Result<()> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.target_table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let batch = wide::encode_rows(columns.len(), rows);
        let descs = batch
            .max_lengths
            .iter()
            .map(|&max_str_len| BufferDesc::WText { max_str_len });
        let prepared = self
            .connection
            .prepare(&sql)
            .with_context(|| format!("Preparing {sql}"))?;
        let mut inserter = prepared.into_column_inserter(batch.cells.len(), descs)?;
        inserter.set_num_rows(batch.cells.len());
        for col in 0..columns.len() {
            let mut column = inserter
                .column_mut(col)
                .as_w_text_view()
                .ok_or_else(|| anyhow!("Column {} is not bound as wide text", columns[col]))?;
            for (row, cells) in batch.cells.iter().enumerate() {
                column.set_cell(row, cells.get(col).and_then(|cell| cell.as_deref()));
            }
        }
        inserter.execute().context("Executing batched insert")?;
        Ok(())
    }

    fn bulk_load(&mut self, staging_file: &Path) -> Result<()> {
        let path = staging_file
            .to_str()
            .ok_or_else(|| anyhow!("Staging path {staging_file:?} is not valid UTF-8"))?
            .replace('\'', "''");
        let sql = format!(
            "BULK INSERT {} FROM '{}' WITH (FIELDTERMINATOR = '\\t', ROWTERMINATOR = '\\n', CODEPAGE = '65001', TABLOCK)",
            self.target_table, path
        );
        self.exec(&sql)
    }

    fn recompute(&mut self) -> Result<()> {
        self.exec(&format!("EXEC {}", self.recompute_procedure))
    }
}
