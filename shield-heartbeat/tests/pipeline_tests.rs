//! End-to-end pipeline tests with in-memory collaborators

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use shield_common::config::PipelineConfig;
use shield_common::{Error, Result};
use shield_heartbeat::merger::SnapshotFetcher;
use shield_heartbeat::source::MemorySource;
use shield_heartbeat::storage::MemoryObjectStore;
use shield_heartbeat::{CountTree, Pipeline, Publisher};
use std::collections::HashMap;
use std::sync::Arc;

const PREFIX: &str = "normandy/data/heartbeat/daily/";

struct StaticFetcher(HashMap<String, Vec<u8>>);

#[async_trait]
impl SnapshotFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.0.get(url).cloned())
    }
}

fn ping(survey: &str, date: &str, payload: Value) -> Value {
    let mut payload = payload;
    payload["surveyId"] = json!(survey);
    json!({
        "meta": {
            "docType": "heartbeat",
            "appName": "Firefox",
            "appUpdateChannel": "release",
            "submissionDate": date
        },
        "payload": payload
    })
}

fn config() -> PipelineConfig {
    PipelineConfig {
        start_date: Some("20240101".to_string()),
        end_date: Some("20240102".to_string()),
        ..Default::default()
    }
}

fn history(body: &str) -> StaticFetcher {
    let url = config().history.resolved_url(&config().storage);
    StaticFetcher(HashMap::from([(url, body.as_bytes().to_vec())]))
}

fn pipeline(pings: Vec<Value>, fetcher: StaticFetcher) -> (Pipeline, Arc<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::new());
    let publisher = Publisher::new(store.clone(), PREFIX, "text/csv");
    let pipeline = Pipeline::new(
        config(),
        Arc::new(MemorySource::new(pings)),
        Arc::new(fetcher),
        publisher,
    )
    .with_partitions(3);
    (pipeline, store)
}

fn stored_tree(store: &MemoryObjectStore, name: &str) -> CountTree {
    let object = store
        .get(&format!("{PREFIX}{name}.json"))
        .unwrap_or_else(|| panic!("{name}.json not published"));
    serde_json::from_slice(&object.body).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
}

#[tokio::test]
async fn test_merge_scenario() {
    let mut pings: Vec<Value> = (0..3)
        .map(|i| ping(&format!("s1::install{i}"), "20240101", json!({"engagedTS": 100 + i})))
        .collect();
    pings.push(ping("s1", "20240102", json!({"offeredTS": 5})));

    let (pipeline, store) = pipeline(pings, history(r#"{"s1": {"20240101": {"offered": 2}}}"#));
    let summary = pipeline.run(today()).await.unwrap();

    let expected: CountTree = serde_json::from_str(
        r#"{"s1": {"20240101": {"engaged": 3, "offered": 2}, "20240102": {"offered": 1}}}"#,
    )
    .unwrap();
    assert_eq!(stored_tree(&store, "all"), expected);
    assert_eq!(summary.latest, "20240102");
    assert_eq!(summary.records, 4);
    assert_eq!(summary.distinct_keys, 2);
    assert_eq!(summary.dates, vec!["20240101", "20240102"]);
    assert_eq!(summary.published.len(), 8);

    let latest = stored_tree(&store, "latest");
    assert_eq!(latest, stored_tree(&store, "20240102"));
    assert_eq!(latest.leaf(&["s1", "offered"]), Some(1));

    let csv = store.get(&format!("{PREFIX}20240101.csv")).unwrap();
    assert_eq!(
        String::from_utf8(csv.body).unwrap(),
        "\"s1\",\"engaged\",\"3\"\r\n"
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let pings = vec![
        ping("s1", "20240101", json!({"votedTS": 1, "score": 5})),
        ping("s2", "20240102", json!({"closedTS": 1})),
    ];

    let (first, store) = pipeline(pings.clone(), history("{}"));
    first.run(today()).await.unwrap();
    let after_first = store.get(&format!("{PREFIX}all.json")).unwrap().body;

    let (second, store) = pipeline(pings, history(std::str::from_utf8(&after_first).unwrap()));
    let summary = second.run(today()).await.unwrap();

    assert_eq!(store.get(&format!("{PREFIX}all.json")).unwrap().body, after_first);
    assert_eq!(summary.merge.unchanged, 2);
    assert_eq!(summary.merge.inserted, 0);
}

#[tokio::test]
async fn test_out_of_range_pings_ignored() {
    let pings = vec![
        ping("s1", "20231231", json!({"engagedTS": 1})),
        ping("s1", "20240101", json!({"expiredTS": 1})),
    ];
    let (pipeline, store) = pipeline(pings, history("{}"));
    let summary = pipeline.run(today()).await.unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(
        stored_tree(&store, "all").leaf(&["s1", "20240101", "expired"]),
        Some(1)
    );
    assert!(store.get(&format!("{PREFIX}20231231.json")).is_none());
}

#[tokio::test]
async fn test_empty_batch_publishes_empty_latest() {
    let (pipeline, store) = pipeline(Vec::new(), history(r#"{"s9": {"20230101": {"closed": 4}}}"#));
    let summary = pipeline.run(today()).await.unwrap();

    assert_eq!(summary.latest, "00000000");
    assert!(summary.dates.is_empty());
    assert!(stored_tree(&store, "latest").is_empty());
    assert_eq!(
        stored_tree(&store, "all").leaf(&["s9", "20230101", "closed"]),
        Some(4)
    );
    assert_eq!(
        store.keys(),
        vec![
            format!("{PREFIX}all.csv"),
            format!("{PREFIX}all.json"),
            format!("{PREFIX}latest.csv"),
            format!("{PREFIX}latest.json"),
        ]
    );
}

#[tokio::test]
async fn test_missing_history_aborts_before_publishing() {
    let pings = vec![ping("s1", "20240101", json!({"engagedTS": 1}))];
    let (pipeline, store) = pipeline(pings, StaticFetcher(HashMap::new()));

    let err = pipeline.run(today()).await.unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }));
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_unparsable_history_aborts() {
    let (pipeline, store) = pipeline(Vec::new(), history("not json"));

    let err = pipeline.run(today()).await.unwrap_err();
    assert!(matches!(err, Error::ParseFailure { .. }));
    assert!(store.keys().is_empty());
}
