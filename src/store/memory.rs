//! In-memory store that records every call. Used for dry runs in tests and for
//! exercising the loaders and the orchestrator without a database.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};

use super::{ClearMode, PriceSink, ProfileSource};
use crate::{
    data::FieldValue,
    io_utils::STAGING_DELIMITER,
    loader::CANONICAL_COLUMNS,
    profile::{FieldMappingRule, MappingProfile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListProfiles,
    ListRules(i64),
    Clear(ClearMode),
    Insert { rows: usize },
    BulkLoad { path: PathBuf, rows: usize },
    Recompute,
}

/// Where to inject a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ListProfiles,
    ListRules(i64),
    Clear,
    /// Fails the n-th insert call (1-based) counted over the store's lifetime.
    Insert(usize),
    BulkLoad,
    Recompute,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: Vec<MappingProfile>,
    rules: HashMap<i64, Vec<FieldMappingRule>>,
    fail_points: Vec<FailPoint>,
    inserts_seen: usize,
    calls: Vec<StoreCall>,
    columns: Vec<String>,
    rows: Vec<Vec<FieldValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: MappingProfile, rules: Vec<FieldMappingRule>) -> Self {
        self.rules.insert(profile.id, rules);
        self.profiles.push(profile);
        self
    }

    pub fn failing_at(mut self, point: FailPoint) -> Self {
        self.fail_points.push(point);
        self
    }

    pub fn calls(&self) -> &[StoreCall] {
        &self.calls
    }

    /// Columns of the last insert or bulk load into the target table.
    pub fn target_columns(&self) -> &[String] {
        &self.columns
    }

    /// Current content of the target table.
    pub fn target_rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    pub fn insert_sizes(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::Insert { rows } => Some(*rows),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &StoreCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_points.contains(&point) {
            bail!("injected failure at {point:?}");
        }
        Ok(())
    }
}

impl ProfileSource for MemoryStore {
    fn list_active_profiles(&mut self) -> Result<Vec<MappingProfile>> {
        self.calls.push(StoreCall::ListProfiles);
        self.check(FailPoint::ListProfiles)?;
        Ok(self.profiles.iter().filter(|p| p.active).cloned().collect())
    }

    fn list_field_rules(&mut self, profile_id: i64) -> Result<Vec<FieldMappingRule>> {
        self.calls.push(StoreCall::ListRules(profile_id));
        self.check(FailPoint::ListRules(profile_id))?;
        Ok(self.rules.get(&profile_id).cloned().unwrap_or_default())
    }
}

impl PriceSink for MemoryStore {
    fn clear_target(&mut self, mode: ClearMode) -> Result<()> {
        self.calls.push(StoreCall::Clear(mode));
        self.check(FailPoint::Clear)?;
        self.rows.clear();
        Ok(())
    }

    fn insert_batch(&mut self, columns: &[String], rows: &[Vec<FieldValue>]) -> Result<()> {
        self.calls.push(StoreCall::Insert { rows: rows.len() });
        self.inserts_seen += 1;
        self.check(FailPoint::Insert(self.inserts_seen))?;
        self.columns = columns.to_vec();
        self.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn bulk_load(&mut self, staging_file: &Path) -> Result<()> {
        let staged = read_staging_file(staging_file)?;
        self.calls.push(StoreCall::BulkLoad {
            path: staging_file.to_path_buf(),
            rows: staged.len(),
        });
        self.check(FailPoint::BulkLoad)?;
        self.columns = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        self.rows.extend(staged);
        Ok(())
    }

    fn recompute(&mut self) -> Result<()> {
        self.calls.push(StoreCall::Recompute);
        self.check(FailPoint::Recompute)
    }
}

/// Parses a staging file the way the bulk statement does: tab fields, `\n`
/// rows, no quoting, empty field as null.
pub fn read_staging_file(path: &Path) -> Result<Vec<Vec<FieldValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(STAGING_DELIMITER)
        .has_headers(false)
        .quoting(false)
        .from_path(path)
        .with_context(|| format!("Opening staging file {path:?}"))?;
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading staged row {}", idx + 1))?;
        if record.len() != CANONICAL_COLUMNS.len() {
            bail!(
                "Staged row {} has {} field(s), expected {}",
                idx + 1,
                record.len(),
                CANONICAL_COLUMNS.len()
            );
        }
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        FieldValue::Null
                    } else {
                        FieldValue::text(field)
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}
