//! swapi-ingest - archive SWAPI people into a relational store

use anyhow::{Context, Result};
use clap::Parser;
use swapi_common::logging::{init_logging, LogConfig, LogLevel};
use swapi_ingest::config::{FailurePolicy, IngestConfig};
use swapi_ingest::pipeline::run_from_config;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swapi-ingest")]
#[command(author, version, about = "Archive SWAPI people into a relational store")]
struct Cli {
    /// Root URL of the API
    #[arg(long)]
    base_url: Option<String>,

    /// Exclusive upper bound of identifiers to attempt
    #[arg(short, long)]
    total: Option<u32>,

    /// Identifiers fetched concurrently per wave
    #[arg(short, long)]
    group_size: Option<u32>,

    /// What to do when one identifier fails: fail-fast or skip
    #[arg(long)]
    on_error: Option<FailurePolicy>,

    /// Database URL (postgres://... or sqlite://...)
    #[arg(long)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, mut config: IngestConfig) -> IngestConfig {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(total) = self.total {
            config.total_scan_count = total;
        }
        if let Some(group_size) = self.group_size {
            config.group_size = group_size;
        }
        if let Some(policy) = self.on_error {
            config.failure_policy = policy;
        }
        if let Some(database_url) = self.database_url {
            config.database_url = database_url;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("swapi-ingest")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.apply(IngestConfig::from_env().context("Failed to load configuration")?);
    config.validate().context("Invalid configuration")?;

    let summary = run_from_config(config).await.context("Archive run failed")?;

    info!(
        inserted = summary.inserted,
        absent = summary.absent,
        skipped = summary.skipped,
        "Elapsed {:.2?}",
        summary.elapsed
    );
    Ok(())
}
