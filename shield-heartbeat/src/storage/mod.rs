//! Object storage clients for published artifacts
//!
//! Every store overwrites an existing object with the same key.

mod fs;
mod http;

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;

use async_trait::async_trait;
use shield_common::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Destination for artifact bytes
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// One recorded write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in memory
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| shield_common::Error::Internal("object map poisoned".to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Writes a local staging copy, then uploads
///
/// A staging failure stops the upload for that object.
pub struct StagedStore<L, R> {
    local: L,
    remote: R,
}

impl<L, R> StagedStore<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl<L: ObjectStore, R: ObjectStore> ObjectStore for StagedStore<L, R> {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.local.put(key, body.clone(), content_type).await?;
        self.remote.put(key, body, content_type).await
    }

    fn describe(&self) -> String {
        format!("{} -> {}", self.local.describe(), self.remote.describe())
    }
}
