//! Load strategies for a projected price table.
//!
//! Both strategies clear the target table, load the whole projection and then
//! run the recompute procedure. A failure after the clear leaves the table
//! empty or partially loaded; nothing is rolled back.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{error::LoadError, projector::ProjectedTable, store::PriceSink};

mod batched;
mod bulk;

pub use batched::BatchedInsert;
pub use bulk::{BulkStagedInsert, write_staging_file};

/// Column order the bulk statement expects in the staging file.
pub const CANONICAL_COLUMNS: [&str; 13] = [
    "Brand",
    "DetailNum",
    "DetailPrice",
    "DetailName",
    "PriceLogo",
    "Quantity",
    "PackQuantity",
    "Reliability",
    "WeightKG",
    "VolumeKG",
    "MOSA",
    "Restrictions",
    "PartID",
];

pub const DEFAULT_BATCH_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Parameterized inserts in fixed-size batches
    #[default]
    Batched,
    /// One server-side bulk load from a staged file
    Bulk,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    /// Insert calls for the batched strategy, 1 for a bulk load.
    pub batches: usize,
}

pub trait LoadStrategy {
    fn name(&self) -> &'static str;

    fn load(&self, table: &ProjectedTable, sink: &mut dyn PriceSink)
    -> Result<LoadReport, LoadError>;
}

pub fn strategy_for(
    kind: StrategyKind,
    batch_size: usize,
    staging_dir: PathBuf,
) -> Box<dyn LoadStrategy> {
    match kind {
        StrategyKind::Batched => Box::new(BatchedInsert::new(batch_size)),
        StrategyKind::Bulk => Box::new(BulkStagedInsert::new(staging_dir)),
    }
}
