//! Seams to the relational store.
//!
//! [`ProfileSource`] is the read side (profile catalogue and field mappings),
//! [`PriceSink`] the write side (target price table and recompute procedure).
//! Errors are returned as-is; retry and skip decisions belong to the caller.

use std::path::Path;

use anyhow::Result;

use crate::{
    config::LoaderConfig,
    data::FieldValue,
    error::LoadError,
    profile::{FieldMappingRule, MappingProfile},
};

pub mod memory;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod wide;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    /// Row-by-row `DELETE`.
    Delete,
    /// `TRUNCATE TABLE`, required before a table-locked bulk load.
    Truncate,
}

pub trait ProfileSource {
    /// Active price profiles, in store order.
    fn list_active_profiles(&mut self) -> Result<Vec<MappingProfile>>;

    /// Field rules of one profile, in store order.
    fn list_field_rules(&mut self, profile_id: i64) -> Result<Vec<FieldMappingRule>>;
}

pub trait PriceSink {
    fn clear_target(&mut self, mode: ClearMode) -> Result<()>;

    /// One parameterized multi-row insert. `columns` names the target columns
    /// in the order values appear in each row.
    fn insert_batch(&mut self, columns: &[String], rows: &[Vec<FieldValue>]) -> Result<()>;

    /// One server-side bulk load of a staged, tab-separated file laid out in
    /// [`crate::loader::CANONICAL_COLUMNS`] order.
    fn bulk_load(&mut self, staging_file: &Path) -> Result<()>;

    /// Runs the procedure that derives dependent price fields.
    fn recompute(&mut self) -> Result<()>;
}

/// Opens the configured store. Failing here is fatal for the run.
#[cfg(feature = "odbc")]
pub fn connect(config: &LoaderConfig) -> Result<odbc::OdbcStore, LoadError> {
    odbc::OdbcStore::connect(config)
}

/// Opens the configured store. Failing here is fatal for the run.
#[cfg(not(feature = "odbc"))]
pub fn connect(config: &LoaderConfig) -> Result<Unavailable, LoadError> {
    config.connection.odbc_connection_string()?;
    Err(LoadError::StoreConnection {
        cause: anyhow::anyhow!(
            "price-loader was built without the `odbc` feature; rebuild with `--features odbc`"
        ),
    })
}

/// Store type of a build without a database backend. It has no values, so
/// [`connect`] can only fail.
#[cfg(not(feature = "odbc"))]
#[derive(Debug)]
pub enum Unavailable {}

#[cfg(not(feature = "odbc"))]
impl ProfileSource for Unavailable {
    fn list_active_profiles(&mut self) -> Result<Vec<MappingProfile>> {
        match *self {}
    }

    fn list_field_rules(&mut self, _profile_id: i64) -> Result<Vec<FieldMappingRule>> {
        match *self {}
    }
}

#[cfg(not(feature = "odbc"))]
impl PriceSink for Unavailable {
    fn clear_target(&mut self, _mode: ClearMode) -> Result<()> {
        match *self {}
    }

    fn insert_batch(&mut self, _columns: &[String], _rows: &[Vec<FieldValue>]) -> Result<()> {
        match *self {}
    }

    fn bulk_load(&mut self, _staging_file: &Path) -> Result<()> {
        match *self {}
    }

    fn recompute(&mut self) -> Result<()> {
        match *self {}
    }
}
