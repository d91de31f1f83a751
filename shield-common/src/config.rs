//! Configuration loading and resolution
//!
//! Settings are layered in priority order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults

use crate::dates::SubmissionDate;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SHIELD_CONFIG";

/// Top-level configuration for the daily heartbeat job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Extra days before yesterday to include when no start date is given
    pub lookback_days: u32,

    /// Inclusive first submission date (`YYYYMMDD`)
    pub start_date: Option<String>,

    /// Inclusive last submission date (`YYYYMMDD`)
    pub end_date: Option<String>,

    /// Fraction of matching records to keep, in (0, 1]
    pub sample_fraction: f64,

    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 0,
            start_date: None,
            end_date: None,
            sample_fraction: 1.0,
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where raw pings come from and which ones qualify
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory scanned recursively for newline-delimited JSON pings
    pub input_dir: PathBuf,
    pub doc_type: String,
    pub app: String,
    pub channel: String,
    /// Seed for the sampling RNG; unset draws from entropy
    pub sample_seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("pings"),
            doc_type: "heartbeat".to_string(),
            app: "Firefox".to_string(),
            channel: "release".to_string(),
            sample_seed: None,
        }
    }
}

/// Object storage addressing for published artifacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Public read endpoint
    pub base_url: String,
    pub bucket: String,
    /// Key prefix, including the trailing slash
    pub prefix: String,
    /// Write endpoint; uploads are skipped when unset
    pub upload_endpoint: Option<String>,
    /// Bearer token sent with uploads
    pub auth_token: Option<String>,
    /// Local directory receiving a copy of every artifact
    pub staging_dir: Option<PathBuf>,
    pub csv_content_type: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://s3-us-west-2.amazonaws.com".to_string(),
            bucket: "telemetry-public-analysis-2".to_string(),
            prefix: "normandy/data/heartbeat/daily/".to_string(),
            upload_endpoint: None,
            auth_token: None,
            staging_dir: None,
            csv_content_type: "text/csv".to_string(),
            timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Object key for an artifact file name
    pub fn object_key(&self, file_name: &str) -> String {
        artifact_key(&self.prefix, file_name)
    }

    /// Publicly reachable URL of an artifact file name
    pub fn public_url(&self, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            self.object_key(file_name)
        )
    }
}

/// Key of an artifact file under a bucket prefix
pub fn artifact_key(prefix: &str, file_name: &str) -> String {
    format!("{}{}", prefix, file_name)
}

/// Retrieval of the previously published cumulative snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HistoryConfig {
    /// Overrides the URL derived from the storage settings
    pub url: Option<String>,
    /// Start from an empty cumulative tree when the snapshot does not exist
    pub allow_missing: bool,
}

impl HistoryConfig {
    pub fn resolved_url(&self, storage: &StorageConfig) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| storage.public_url("all.json"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration
    ///
    /// An explicit path must be readable. Without one, the first existing
    /// default config file is used, and compiled defaults apply when none
    /// exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_file() {
                Some(p) => p,
                None => {
                    debug!("No config file found, using built-in defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parsed start date, if configured
    pub fn start(&self) -> Result<Option<SubmissionDate>> {
        self.start_date.as_deref().map(str::parse::<SubmissionDate>).transpose()
    }

    /// Parsed end date, if configured
    pub fn end(&self) -> Result<Option<SubmissionDate>> {
        self.end_date.as_deref().map(str::parse::<SubmissionDate>).transpose()
    }

    /// Check value ranges and date consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            )));
        }

        let start = self.start().map_err(|e| Error::Config(e.to_string()))?;
        let end = self.end().map_err(|e| Error::Config(e.to_string()))?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(Error::Config(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }

        if !self.storage.prefix.is_empty() && !self.storage.prefix.ends_with('/') {
            return Err(Error::Config(format!(
                "storage prefix must end with '/', got '{}'",
                self.storage.prefix
            )));
        }

        if self.storage.timeout_secs == 0 {
            return Err(Error::Config("storage timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

/// Resolve which config file to read
///
/// Command-line argument first, then `SHIELD_CONFIG`, then the platform
/// default locations. `None` means run on compiled defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_file()
}

/// First existing default config file for the platform
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("shield").join("heartbeat.toml"));
    let system_config = PathBuf::from("/etc/shield/heartbeat.toml");

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }
    None
}
