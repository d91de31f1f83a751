//! Daily run orchestration
//!
//! records -> classify/count -> trees -> merge into cumulative -> publish
//! `all`, one artifact per batch date, and `latest`.

use crate::aggregator::aggregate_partitioned;
use crate::merger::{load_cumulative, merge_batch, HttpSnapshotFetcher, MergeStats, SnapshotFetcher};
use crate::publisher::Publisher;
use crate::source::{NdjsonSource, RecordQuery, RecordSource};
use crate::storage::{FsObjectStore, HttpObjectStore, ObjectStore, StagedStore};
use crate::tree::{build_trees, BatchTrees, CountTree};
use chrono::NaiveDate;
use shield_common::config::{PipelineConfig, StorageConfig};
use shield_common::{DateRange, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Name of the cumulative artifact
pub const ALL_ARTIFACT: &str = "all";
/// Name of the artifact holding the batch's latest date
pub const LATEST_ARTIFACT: &str = "latest";

/// What one run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub range: DateRange,
    pub records: u64,
    pub distinct_keys: usize,
    /// Submission dates present in the batch, ascending
    pub dates: Vec<String>,
    pub latest: String,
    pub merge: MergeStats,
    /// `name.ext` of every file published
    pub published: Vec<String>,
}

pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn RecordSource>,
    fetcher: Arc<dyn SnapshotFetcher>,
    publisher: Publisher,
    partitions: usize,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn RecordSource>,
        fetcher: Arc<dyn SnapshotFetcher>,
        publisher: Publisher,
    ) -> Self {
        let partitions = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            config,
            source,
            fetcher,
            publisher,
            partitions,
        }
    }

    /// Number of blocking tasks used for counting
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    /// Wire the production collaborators described by the config
    ///
    /// `dry_run` writes only the local staging copy.
    pub fn from_config(config: PipelineConfig, dry_run: bool) -> Result<Self> {
        let timeout = Duration::from_secs(config.storage.timeout_secs);
        let source = Arc::new(NdjsonSource::new(config.source.input_dir.clone()));
        let fetcher = Arc::new(HttpSnapshotFetcher::new(timeout)?);
        let store = build_store(&config.storage, dry_run)?;
        info!(store = %store.describe(), "Artifact store ready");

        let publisher = Publisher::new(
            store,
            config.storage.prefix.clone(),
            config.storage.csv_content_type.clone(),
        );
        Ok(Self::new(config, source, fetcher, publisher))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run for the given day
    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary> {
        let range = DateRange::resolve(
            today,
            self.config.lookback_days,
            self.config.start()?,
            self.config.end()?,
        )?;
        let query = RecordQuery::from_config(&self.config, range);
        info!(
            range = %range,
            doc_type = %query.doc_type,
            app = %query.app,
            channel = %query.channel,
            fraction = query.sample_fraction,
            "Fetching pings"
        );

        let pings = self.source.fetch(&query).await?;
        let table = aggregate_partitioned(pings, self.partitions).await?;
        info!(
            records = table.total(),
            distinct_keys = table.len(),
            "Counted classification keys"
        );

        let history_url = self.config.history.resolved_url(&self.config.storage);
        let mut all = load_cumulative(
            self.fetcher.as_ref(),
            &history_url,
            self.config.history.allow_missing,
        )
        .await?;

        let trees = build_trees(&table);
        if !trees.has_latest() {
            warn!("Batch is empty; latest artifact will be empty");
        }
        let merge = merge_batch(&mut all, &table);
        info!(
            inserted = merge.inserted,
            overwritten = merge.overwritten,
            unchanged = merge.unchanged,
            "Merged batch into cumulative counts"
        );

        let artifacts = plan_artifacts(&all, &trees);
        let dates: Vec<String> = trees.date_major.keys().map(str::to_string).collect();
        let published = self.publisher.publish_all(&artifacts).await.into_result()?;

        Ok(RunSummary {
            range,
            records: table.total(),
            distinct_keys: table.len(),
            dates,
            latest: trees.latest,
            merge,
            published,
        })
    }
}

/// Artifacts in publication order: `all`, each batch date ascending, `latest`
///
/// Per-date and latest artifacts carry the date-major subtree
/// (`survey -> status -> count`).
pub fn plan_artifacts(all: &CountTree, trees: &BatchTrees) -> Vec<(String, CountTree)> {
    let mut artifacts = vec![(ALL_ARTIFACT.to_string(), all.clone())];

    for date in trees.date_major.keys() {
        artifacts.push((date.to_string(), trees.date_major.child_or_empty(date)));
    }

    artifacts.push((LATEST_ARTIFACT.to_string(), trees.latest_tree()));
    artifacts
}

/// Choose the artifact store for the storage settings
pub fn build_store(storage: &StorageConfig, dry_run: bool) -> Result<Arc<dyn ObjectStore>> {
    let timeout = Duration::from_secs(storage.timeout_secs);
    let staging = storage.staging_dir.clone().map(FsObjectStore::new);

    match (&storage.upload_endpoint, staging) {
        (Some(endpoint), staging) if !dry_run => {
            let remote = HttpObjectStore::new(
                endpoint.clone(),
                storage.bucket.clone(),
                storage.auth_token.clone(),
                timeout,
            )?;
            Ok(match staging {
                Some(local) => Arc::new(StagedStore::new(local, remote)),
                None => Arc::new(remote),
            })
        }
        (_, Some(local)) => Ok(Arc::new(local)),
        (_, None) if dry_run => Err(Error::Config(
            "dry run requires a staging directory".to_string(),
        )),
        (_, None) => Err(Error::Config(
            "no upload endpoint or staging directory configured".to_string(),
        )),
    }
}
