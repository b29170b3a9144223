use std::time::Instant;

use log::info;

use super::{LoadReport, LoadStrategy};
use crate::{
    error::LoadError,
    projector::ProjectedTable,
    store::{ClearMode, PriceSink},
};

/// Deletes the target rows, inserts the projection in slices of `batch_size`
/// and runs the recompute procedure once after the last slice.
#[derive(Debug, Clone)]
pub struct BatchedInsert {
    batch_size: usize,
}

impl BatchedInsert {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl LoadStrategy for BatchedInsert {
    fn name(&self) -> &'static str {
        "batched"
    }

    fn load(
        &self,
        table: &ProjectedTable,
        sink: &mut dyn PriceSink,
    ) -> Result<LoadReport, LoadError> {
        info!("{} row(s) to load into the price table", table.len());
        sink.clear_target(ClearMode::Delete)
            .map_err(LoadError::store("delete"))?;

        let mut report = LoadReport::default();
        for batch in table.rows().chunks(self.batch_size) {
            sink.insert_batch(table.columns(), batch)
                .map_err(LoadError::store("insert"))?;
            report.rows += batch.len();
            report.batches += 1;
            info!("Inserted {} of {} row(s)", report.rows, table.len());
        }

        let started = Instant::now();
        sink.recompute().map_err(LoadError::store("recompute"))?;
        info!("Recompute procedure finished in {:.2?}", started.elapsed());
        Ok(report)
    }
}
