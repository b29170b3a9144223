pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod inspect;
pub mod io_utils;
pub mod loader;
pub mod locate;
pub mod mapping;
pub mod orchestrator;
pub mod preview;
pub mod profile;
pub mod projector;
pub mod reader;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};

use crate::{
    cli::{Cli, Commands},
    config::{LoaderConfig, LogConfig},
    orchestrator::Orchestrator,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(level: LevelFilter) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("price_loader", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Parses the command line, runs the command and returns the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => {
            let config = LoaderConfig::resolve(&args.store, Some(&args.load))?;
            init_logging(config.log.level_filter()?);
            handle_run(&config)
        }
        Commands::Profiles(args) => {
            let config = LoaderConfig::resolve(&args.store, None)?;
            init_logging(config.log.level_filter()?);
            let mut store = store::connect(&config)?;
            inspect::execute(&mut store)?;
            Ok(0)
        }
        Commands::Preview(args) => {
            let log = LogConfig {
                level: args.log_level.clone().unwrap_or_else(|| "info".into()),
            };
            init_logging(log.level_filter()?);
            preview::execute(&args)?;
            Ok(0)
        }
    }
}

fn handle_run(config: &LoaderConfig) -> Result<i32> {
    debug!(
        "Strategy {:?}, batch size {}, staging dir {:?}, encoding {}",
        config.strategy, config.batch_size, config.staging_dir, config.input_encoding
    );
    let orchestrator = Orchestrator::new(config)?;
    let mut store = store::connect(config)?;
    let summary = orchestrator
        .run(&mut store)
        .context("Price load aborted")?;
    Ok(summary.exit_code())
}
