use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::loader::StrategyKind;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load supplier price lists into the price staging table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load every file of every active price profile into the price table
    Run(RunArgs),
    /// List active price profiles and their resolved field mappings
    Profiles(ProfilesArgs),
    /// Project one file with a profile described in YAML and print the result
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Full ODBC connection string
    #[arg(long, env = "PRICE_LOADER_CONNECTION", hide_env_values = true)]
    pub connection: Option<String>,
    /// Database server host
    #[arg(long, env = "PRICE_LOADER_SERVER")]
    pub server: Option<String>,
    /// Database name
    #[arg(long, env = "PRICE_LOADER_DATABASE")]
    pub database: Option<String>,
    /// Database login (Windows authentication when omitted)
    #[arg(long, env = "PRICE_LOADER_USERNAME")]
    pub username: Option<String>,
    /// Database password
    #[arg(long, env = "PRICE_LOADER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct LoadOverrides {
    /// Load strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,
    /// Rows per insert statement for the batched strategy
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
    /// Directory for bulk staging files (must be visible to the database server)
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,
    /// Character encoding of delimited vendor files
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub load: LoadOverrides,
}

#[derive(Debug, Args)]
pub struct ProfilesArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// YAML file holding a profile and its field rules
    #[arg(short, long)]
    pub profile: PathBuf,
    /// Vendor file to project (the profile's path pattern is ignored)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Number of projected rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Character encoding of a delimited input file
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}
