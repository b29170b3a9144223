use std::{
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use log::{info, warn};
use tempfile::NamedTempFile;

use super::{CANONICAL_COLUMNS, LoadReport, LoadStrategy};
use crate::{
    error::LoadError,
    io_utils,
    projector::ProjectedTable,
    store::{ClearMode, PriceSink},
};

/// Truncates the target, stages the projection as a tab-separated file and
/// issues one bulk statement against it.
///
/// Every run stages into its own uniquely named file under `staging_dir`, so
/// concurrent runs on one host do not collide. The file is removed on every
/// exit path once the bulk statement returns. `staging_dir` must be readable
/// by the database server under the same path.
#[derive(Debug, Clone)]
pub struct BulkStagedInsert {
    staging_dir: PathBuf,
}

impl BulkStagedInsert {
    pub fn new(staging_dir: PathBuf) -> Self {
        Self { staging_dir }
    }
}

impl LoadStrategy for BulkStagedInsert {
    fn name(&self) -> &'static str {
        "bulk"
    }

    fn load(
        &self,
        table: &ProjectedTable,
        sink: &mut dyn PriceSink,
    ) -> Result<LoadReport, LoadError> {
        let (staged, dropped) = table.conform_to(&CANONICAL_COLUMNS);
        if !dropped.is_empty() {
            warn!(
                "Columns outside the bulk layout are not loaded: {}",
                dropped.join(", ")
            );
        }

        sink.clear_target(ClearMode::Truncate)
            .map_err(LoadError::store("truncate"))?;

        let staging = write_staging_file(&self.staging_dir, &staged)
            .map_err(|cause| LoadError::BulkStage { cause })?;
        info!(
            "Running bulk load of {} row(s) from {:?}",
            staged.len(),
            staging.path()
        );
        let started = Instant::now();
        let outcome = sink.bulk_load(staging.path());
        let elapsed = started.elapsed();
        let staging_path = staging.path().to_path_buf();
        match staging.close() {
            Ok(()) => info!("Removed staging file {staging_path:?}"),
            Err(err) => warn!("Could not remove staging file {staging_path:?}: {err}"),
        }
        outcome.map_err(|cause| LoadError::BulkStage { cause })?;
        info!("Bulk load finished in {elapsed:.2?}");

        let started = Instant::now();
        sink.recompute().map_err(LoadError::store("recompute"))?;
        info!("Recompute procedure finished in {:.2?}", started.elapsed());
        Ok(LoadReport {
            rows: staged.len(),
            batches: 1,
        })
    }
}

/// Writes `table` without header into a fresh `price_import_*.tsv` under `dir`.
/// The file is deleted when the returned handle is dropped or closed.
pub fn write_staging_file(dir: &Path, table: &ProjectedTable) -> Result<NamedTempFile> {
    std::fs::create_dir_all(dir).with_context(|| format!("Creating staging directory {dir:?}"))?;
    let staging = tempfile::Builder::new()
        .prefix("price_import_")
        .suffix(".tsv")
        .tempfile_in(dir)
        .with_context(|| format!("Creating staging file in {dir:?}"))?;
    {
        let mut writer = io_utils::open_staging_writer(BufWriter::new(staging.as_file()));
        for (idx, row) in table.rows().iter().enumerate() {
            let fields = row.iter().map(|value| {
                value
                    .as_sql_text()
                    .map(|text| io_utils::flatten_control_chars(&text).into_owned())
                    .unwrap_or_default()
            });
            writer
                .write_record(fields)
                .with_context(|| format!("Staging row {}", idx + 1))?;
        }
        writer.flush().context("Flushing staging file")?;
    }
    Ok(staging)
}
