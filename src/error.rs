//! Failure taxonomy for a load run.
//!
//! Plumbing code (file I/O, store calls) uses `anyhow` with context. Everything
//! that reaches the orchestrator is folded into [`LoadError`], whose
//! [`Severity`] decides whether the run stops or moves on to the next file or
//! profile.

use std::path::PathBuf;

use thiserror::Error;

use crate::data::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the whole run.
    Fatal,
    /// Skip the current file or profile and keep going.
    Recoverable,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no active price profiles found")]
    NoActiveProfiles,

    #[error("profile {profile_id} has no field mappings")]
    NoFieldRules { profile_id: i64 },

    #[error("no files match pattern '{pattern}'")]
    NoMatchingFiles { pattern: String },

    #[error("invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error(
        "column {position} for field '{field}' is out of bounds (file has {column_count} column(s))"
    )]
    ColumnOutOfBounds {
        field: String,
        /// 1-based, as stored in the profile.
        position: usize,
        column_count: usize,
    },

    #[error("constant '{value}' for field '{field}' is not a valid {field_type}")]
    InvalidConstant {
        field: String,
        value: String,
        field_type: FieldType,
    },

    #[error("failed to read {}: {cause:#}", .path.display())]
    Read {
        path: PathBuf,
        cause: anyhow::Error,
    },

    #[error("store operation '{operation}' failed: {cause:#}")]
    Store {
        operation: &'static str,
        cause: anyhow::Error,
    },

    #[error("cannot connect to the price store: {cause:#}")]
    StoreConnection { cause: anyhow::Error },

    #[error("bulk staging failed: {cause:#}")]
    BulkStage { cause: anyhow::Error },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoadError {
    pub fn severity(&self) -> Severity {
        match self {
            LoadError::StoreConnection { .. } | LoadError::Config(_) => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Adapter for `map_err` on store calls.
    pub fn store(operation: &'static str) -> impl FnOnce(anyhow::Error) -> LoadError {
        move |cause| LoadError::Store { operation, cause }
    }
}
