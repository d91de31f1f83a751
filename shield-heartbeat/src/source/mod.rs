//! Raw ping retrieval
//!
//! A [`RecordSource`] returns the heartbeat pings matching a query: document
//! type, application, release channel, inclusive submission date range and
//! an optional sampling fraction.

mod ndjson;

pub use ndjson::NdjsonSource;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use shield_common::config::{PipelineConfig, SourceConfig};
use shield_common::{DateRange, Result};

/// Selection criteria for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub doc_type: String,
    pub app: String,
    pub channel: String,
    pub range: DateRange,
    pub sample_fraction: f64,
    pub sample_seed: Option<u64>,
}

impl RecordQuery {
    pub fn from_config(config: &PipelineConfig, range: DateRange) -> Self {
        let SourceConfig {
            doc_type,
            app,
            channel,
            sample_seed,
            ..
        } = &config.source;

        Self {
            doc_type: doc_type.clone(),
            app: app.clone(),
            channel: channel.clone(),
            range,
            sample_fraction: config.sample_fraction,
            sample_seed: *sample_seed,
        }
    }

    /// Whether a ping passes the type, app, channel and date filters
    pub fn matches(&self, ping: &Value) -> bool {
        let meta = match ping.get("meta") {
            Some(meta) => meta,
            None => return false,
        };
        let field = |name: &str| meta.get(name).and_then(Value::as_str);

        field("docType") == Some(self.doc_type.as_str())
            && field("appName") == Some(self.app.as_str())
            && field("appUpdateChannel") == Some(self.channel.as_str())
            && field("submissionDate").is_some_and(|date| self.range.contains(date))
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::new(self.sample_fraction, self.sample_seed)
    }
}

/// Bernoulli sampler keeping each record with a fixed probability
pub struct Sampler {
    fraction: f64,
    rng: StdRng,
}

impl Sampler {
    pub fn new(fraction: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { fraction, rng }
    }

    pub fn keep(&mut self) -> bool {
        self.fraction >= 1.0 || self.rng.gen::<f64>() < self.fraction
    }
}

/// Supplies raw pings for a query
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Value>>;
}

/// Pings held in memory, filtered and sampled like any other source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pings: Vec<Value>,
}

impl MemorySource {
    pub fn new(pings: Vec<Value>) -> Self {
        Self { pings }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<Value>> {
        let mut sampler = query.sampler();
        Ok(self
            .pings
            .iter()
            .filter(|ping| query.matches(ping))
            .filter(|_| sampler.keep())
            .cloned()
            .collect())
    }
}
