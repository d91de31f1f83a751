//! shield-heartbeat - daily heartbeat survey publication job
//!
//! Counts yesterday's (or a configured range of) heartbeat pings per survey,
//! date and lifecycle status, merges them into the cumulative dataset and
//! republishes `all`, per-date and `latest` artifacts as JSON and CSV.
//!
//! Runs to completion once per invocation; schedule it daily. Overlapping
//! runs against the same bucket race on `all.json` and are not supported.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use shield_common::config::{resolve_config_path, PipelineConfig};
use shield_heartbeat::Pipeline;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for shield-heartbeat
#[derive(Parser, Debug)]
#[command(name = "shield-heartbeat")]
#[command(about = "Publish daily heartbeat survey counts")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SHIELD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing newline-delimited JSON pings
    #[arg(short, long, env = "SHIELD_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Extra days before yesterday to include
    #[arg(long, env = "SHIELD_LOOKBACK")]
    lookback: Option<u32>,

    /// First submission date (YYYYMMDD), inclusive
    #[arg(long, env = "SHIELD_START")]
    start: Option<String>,

    /// Last submission date (YYYYMMDD), inclusive
    #[arg(long, env = "SHIELD_END")]
    end: Option<String>,

    /// Fraction of matching pings to sample, in (0, 1]
    #[arg(long, env = "SHIELD_FRACTION")]
    fraction: Option<f64>,

    /// Seed for reproducible sampling
    #[arg(long, env = "SHIELD_SEED")]
    seed: Option<u64>,

    /// Local directory receiving a copy of every artifact
    #[arg(long, env = "SHIELD_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// S3-compatible endpoint accepting artifact uploads
    #[arg(long, env = "SHIELD_UPLOAD_ENDPOINT")]
    upload_endpoint: Option<String>,

    /// URL of the previously published all.json
    #[arg(long, env = "SHIELD_HISTORY_URL")]
    history_url: Option<String>,

    /// Start from empty cumulative counts when all.json does not exist
    #[arg(long, env = "SHIELD_ALLOW_MISSING_HISTORY")]
    allow_missing_history: bool,

    /// Write artifacts to the staging directory only
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    /// Command-line values take priority over the config file
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.input_dir {
            config.source.input_dir = dir.clone();
        }
        if let Some(lookback) = self.lookback {
            config.lookback_days = lookback;
        }
        if let Some(start) = &self.start {
            config.start_date = Some(start.clone());
        }
        if let Some(end) = &self.end {
            config.end_date = Some(end.clone());
        }
        if let Some(fraction) = self.fraction {
            config.sample_fraction = fraction;
        }
        if let Some(seed) = self.seed {
            config.source.sample_seed = Some(seed);
        }
        if let Some(dir) = &self.staging_dir {
            config.storage.staging_dir = Some(dir.clone());
        }
        if let Some(endpoint) = &self.upload_endpoint {
            config.storage.upload_endpoint = Some(endpoint.clone());
        }
        if let Some(url) = &self.history_url {
            config.history.url = Some(url.clone());
        }
        if self.allow_missing_history {
            config.history.allow_missing = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config =
        PipelineConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    // RUST_LOG overrides the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting shield-heartbeat v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("SHIELD_REVISION"),
        env!("SHIELD_BUILT_AT"),
        env!("SHIELD_BUILD_PROFILE")
    );
    warn!("Single-writer job: overlapping runs against the same bucket race on all.json");
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    config.validate().context("Invalid configuration")?;

    let pipeline = Pipeline::from_config(config, args.dry_run)
        .context("Failed to initialize pipeline")?;
    let today = chrono::Utc::now().date_naive();

    match pipeline.run(today).await {
        Ok(summary) => {
            info!(
                range = %summary.range,
                records = summary.records,
                keys = summary.distinct_keys,
                dates = summary.dates.len(),
                latest = %summary.latest,
                files = summary.published.len(),
                "Run complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e).context("Heartbeat publication failed")
        }
    }
}
