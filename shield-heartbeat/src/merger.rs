//! Historical merge of batch counts into the cumulative tree
//!
//! The cumulative survey-major tree is fetched once per run, overlaid with
//! the batch counts (the batch value replaces any stored value at the same
//! leaf), and republished wholesale. Leaves the batch does not touch are kept.

use crate::aggregator::CountTable;
use crate::tree::CountTree;
use async_trait::async_trait;
use shield_common::{Error, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Leaf-level outcome of a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Leaves that did not exist before
    pub inserted: usize,
    /// Existing leaves whose value was replaced
    pub overwritten: usize,
    /// Existing leaves written with the value they already had
    pub unchanged: usize,
}

/// Overlay batch counts onto the cumulative survey-major tree
pub fn merge_batch(cumulative: &mut CountTree, table: &CountTable) -> MergeStats {
    let mut stats = MergeStats::default();

    for (key, count) in table.iter() {
        let path = [&key.survey_id, &key.submission_date, &key.status];
        match cumulative.leaf(&path) {
            None => stats.inserted += 1,
            Some(previous) if previous == count => stats.unchanged += 1,
            Some(previous) => {
                debug!(%key, previous, count, "Overwriting cumulative count");
                stats.overwritten += 1;
            }
        }
        cumulative.set(&path, count);
    }

    stats
}

/// Retrieves the previously published cumulative snapshot
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Raw snapshot body; `Ok(None)` when the snapshot does not exist
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Plain HTTP GET against the public artifact URL
pub struct HttpSnapshotFetcher {
    http_client: reqwest::Client,
}

impl HttpSnapshotFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        debug!(url = %url, "Fetching cumulative snapshot");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::SourceUnavailable {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::SourceUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(body.to_vec()))
    }
}

/// Load the cumulative tree
///
/// A missing snapshot is fatal unless `allow_missing` is set, in which case
/// the run starts from an empty tree.
pub async fn load_cumulative(
    fetcher: &dyn SnapshotFetcher,
    url: &str,
    allow_missing: bool,
) -> Result<CountTree> {
    let body = match fetcher.fetch(url).await? {
        Some(body) => body,
        None if allow_missing => {
            warn!(url = %url, "Cumulative snapshot not found, starting from empty");
            return Ok(CountTree::new());
        }
        None => {
            return Err(Error::SourceUnavailable {
                url: url.to_string(),
                reason: "snapshot not found".to_string(),
            })
        }
    };

    let tree = parse_snapshot(&body, url)?;
    info!(
        url = %url,
        surveys = tree.keys().count(),
        leaves = tree.leaf_count(),
        "Loaded cumulative snapshot"
    );
    Ok(tree)
}

/// Decode a published `all.json` body
///
/// The top level must be an object; a bare number is not a snapshot.
pub fn parse_snapshot(body: &[u8], what: &str) -> Result<CountTree> {
    let tree: CountTree = serde_json::from_slice(body).map_err(|e| Error::ParseFailure {
        what: what.to_string(),
        reason: e.to_string(),
    })?;

    match tree {
        CountTree::Branch(_) => Ok(tree),
        CountTree::Leaf(_) => Err(Error::ParseFailure {
            what: what.to_string(),
            reason: "snapshot top level is not an object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationKey;
    use std::collections::HashMap;

    fn batch() -> CountTable {
        [
            (ClassificationKey::new("s1", "20240101", "engaged"), 3),
            (ClassificationKey::new("s1", "20240102", "offered"), 1),
        ]
        .into_iter()
        .collect()
    }

    fn prior() -> CountTree {
        serde_json::from_str(r#"{"s1": {"20240101": {"offered": 2}}}"#).unwrap()
    }

    struct StaticFetcher(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl SnapshotFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.0.get(url).cloned())
        }
    }

    #[test]
    fn test_merge_overlays_and_preserves() {
        let mut all = prior();
        let stats = merge_batch(&mut all, &batch());

        let expected: CountTree = serde_json::from_str(
            r#"{"s1": {"20240101": {"engaged": 3, "offered": 2}, "20240102": {"offered": 1}}}"#,
        )
        .unwrap();
        assert_eq!(all, expected);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.overwritten, 0);
    }

    #[test]
    fn test_merge_overwrites_instead_of_adding() {
        let mut all = prior();
        let table: CountTable = [(ClassificationKey::new("s1", "20240101", "offered"), 5)]
            .into_iter()
            .collect();
        let stats = merge_batch(&mut all, &table);
        assert_eq!(all.leaf(&["s1", "20240101", "offered"]), Some(5));
        assert_eq!(stats.overwritten, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut once = prior();
        merge_batch(&mut once, &batch());

        let mut twice = prior();
        merge_batch(&mut twice, &batch());
        let stats = merge_batch(&mut twice, &batch());

        assert_eq!(once, twice);
        assert_eq!(stats.unchanged, 2);
        assert_eq!(stats.inserted, 0);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_is_fatal_by_default() {
        let fetcher = StaticFetcher(HashMap::new());
        let err = load_cumulative(&fetcher, "http://x/all.json", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_allowed() {
        let fetcher = StaticFetcher(HashMap::new());
        let tree = load_cumulative(&fetcher, "http://x/all.json", true).await.unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_load_unparsable_snapshot() {
        let mut docs = HashMap::new();
        docs.insert("http://x/all.json".to_string(), b"<html>oops</html>".to_vec());
        let fetcher = StaticFetcher(docs);

        let err = load_cumulative(&fetcher, "http://x/all.json", true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ParseFailure { .. }));
    }

    #[test]
    fn test_parse_rejects_bare_number() {
        assert!(matches!(
            parse_snapshot(b"42", "all.json"),
            Err(Error::ParseFailure { .. })
        ));
        assert!(parse_snapshot(b"{}", "all.json").unwrap().is_empty());
    }
}
