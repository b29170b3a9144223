//! Run configuration, built once at start-up and passed down by reference.
//!
//! Values come from an optional YAML file; command-line flags and their
//! environment variables override individual keys.

use std::{fs::File, io::BufReader, path::Path, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{
    cli::{LoadOverrides, StoreArgs},
    error::LoadError,
    io_utils::DEFAULT_INPUT_ENCODING,
    loader::{DEFAULT_BATCH_SIZE, StrategyKind},
};

pub const DEFAULT_ODBC_DRIVER: &str = "ODBC Driver 18 for SQL Server";
/// `MappingTypeID` of price-list profiles in the profile catalogue.
pub const PRICE_MAPPING_TYPE: i32 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    pub connection: ConnectionConfig,
    pub strategy: StrategyKind,
    pub batch_size: usize,
    pub staging_dir: PathBuf,
    pub input_encoding: String,
    pub target_table: String,
    pub recompute_procedure: String,
    pub mapping_type_id: i32,
    pub log: LogConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            strategy: StrategyKind::Batched,
            batch_size: DEFAULT_BATCH_SIZE,
            staging_dir: std::env::temp_dir(),
            input_encoding: DEFAULT_INPUT_ENCODING.to_string(),
            target_table: "dbo.pPrice".to_string(),
            recompute_procedure: "PriceUpdate".to_string(),
            mapping_type_id: PRICE_MAPPING_TYPE,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Full ODBC connection string; when set, the other keys are ignored.
    pub connection_string: Option<String>,
    pub driver: String,
    pub server: Option<String>,
    pub database: Option<String>,
    /// Windows authentication is used when no username is given.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            driver: DEFAULT_ODBC_DRIVER.to_string(),
            server: None,
            database: None,
            username: None,
            password: None,
        }
    }
}

impl ConnectionConfig {
    pub fn odbc_connection_string(&self) -> Result<String, LoadError> {
        if let Some(raw) = self.connection_string.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(raw.to_string());
        }
        let server = self
            .server
            .as_deref()
            .ok_or_else(|| LoadError::Config("connection.server is not set".into()))?;
        let database = self
            .database
            .as_deref()
            .ok_or_else(|| LoadError::Config("connection.database is not set".into()))?;
        let credentials = match &self.username {
            Some(user) => format!(
                "Uid={};Pwd={};",
                user,
                self.password.as_deref().unwrap_or_default()
            ),
            None => "Trusted_Connection=Yes;".to_string(),
        };
        Ok(format!(
            "Driver={{{}}};Server={};Database={};{}Encrypt=no;TrustServerCertificate=yes;",
            self.driver, server, database, credentials
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, LoadError> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| LoadError::Config(format!("unknown log level '{}'", self.level)))
    }
}

impl LoaderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing config YAML")
    }

    /// Loads the optional config file, applies command-line overrides and validates.
    pub fn resolve(store: &StoreArgs, overrides: Option<&LoadOverrides>) -> Result<Self> {
        let mut config = match &store.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_store_args(store);
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn apply_store_args(&mut self, args: &StoreArgs) {
        let connection = &mut self.connection;
        if args.connection.is_some() {
            connection.connection_string = args.connection.clone();
        }
        if args.server.is_some() {
            connection.server = args.server.clone();
        }
        if args.database.is_some() {
            connection.database = args.database.clone();
        }
        if args.username.is_some() {
            connection.username = args.username.clone();
        }
        if args.password.is_some() {
            connection.password = args.password.clone();
        }
        if let Some(level) = &args.log_level {
            self.log.level = level.clone();
        }
    }

    pub fn apply_overrides(&mut self, overrides: &LoadOverrides) {
        if let Some(strategy) = overrides.strategy {
            self.strategy = strategy;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(dir) = &overrides.staging_dir {
            self.staging_dir = dir.clone();
        }
        if let Some(encoding) = &overrides.input_encoding {
            self.input_encoding = encoding.clone();
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.batch_size == 0 {
            return Err(LoadError::Config("batch_size must be at least 1".into()));
        }
        crate::io_utils::resolve_encoding(&self.input_encoding)
            .map_err(|err| LoadError::Config(err.to_string()))?;
        self.log.level_filter()?;
        ensure_identifier("target_table", &self.target_table)?;
        ensure_identifier("recompute_procedure", &self.recompute_procedure)?;
        Ok(())
    }
}

/// Table and procedure names are spliced into SQL text, so only plain
/// (optionally schema-qualified or bracketed) identifiers are accepted.
fn ensure_identifier(key: &str, value: &str) -> Result<(), LoadError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
    if valid {
        Ok(())
    } else {
        Err(LoadError::Config(format!(
            "{key} '{value}' is not a plain SQL identifier"
        )))
    }
}
