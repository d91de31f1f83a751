//! Count-by-value over classification keys
//!
//! Counting is commutative and associative: partial tables built over any
//! partitioning of a batch merge into the same table a single pass produces.

use crate::classifier::{classify, ClassificationKey};
use serde_json::Value;
use shield_common::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Occurrence count per distinct classification key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable {
    counts: BTreeMap<ClassificationKey, u64>,
}

impl CountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every key in the sequence
    pub fn count_by_value<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = ClassificationKey>,
    {
        let mut table = Self::new();
        for key in keys {
            table.add(key, 1);
        }
        table
    }

    /// Classify and count a batch of pings
    pub fn from_pings<'a, I>(pings: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        Self::count_by_value(pings.into_iter().map(classify))
    }

    pub fn add(&mut self, key: ClassificationKey, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    /// Fold another partial table into this one
    pub fn merge(&mut self, other: CountTable) {
        for (key, count) in other.counts {
            self.add(key, count);
        }
    }

    pub fn get(&self, key: &ClassificationKey) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, i.e. the number of records counted
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassificationKey, u64)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(ClassificationKey, u64)> for CountTable {
    fn from_iter<T: IntoIterator<Item = (ClassificationKey, u64)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (key, count) in iter {
            table.add(key, count);
        }
        table
    }
}

/// Classify and count pings across `partitions` blocking tasks
///
/// The result does not depend on the partition count.
pub async fn aggregate_partitioned(pings: Vec<Value>, partitions: usize) -> Result<CountTable> {
    let partitions = partitions.max(1);
    if pings.is_empty() {
        return Ok(CountTable::new());
    }

    let pings = Arc::new(pings);
    let chunk_size = pings.len().div_ceil(partitions);
    let mut handles = Vec::with_capacity(partitions);

    for start in (0..pings.len()).step_by(chunk_size) {
        let pings = Arc::clone(&pings);
        let end = (start + chunk_size).min(pings.len());
        handles.push(tokio::task::spawn_blocking(move || {
            CountTable::from_pings(&pings[start..end])
        }));
    }

    let mut table = CountTable::new();
    for (index, handle) in handles.into_iter().enumerate() {
        let partial = handle
            .await
            .map_err(|e| Error::Internal(format!("count partition {} failed: {}", index, e)))?;
        debug!(partition = index, keys = partial.len(), "Partition counted");
        table.merge(partial);
    }

    Ok(table)
}
