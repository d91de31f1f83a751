//! Local filesystem store

use super::ObjectStore;
use async_trait::async_trait;
use shield_common::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Writes objects to `{root}/{key}`, creating parent directories
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path for a key; keys may not climb out of the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(Error::InvalidInput(format!("invalid object key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        debug!(path = %path.display(), bytes = body.len(), "Staged artifact");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_escaping_keys() {
        let store = FsObjectStore::new("/tmp/stage");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/abs/key").is_err());
        assert!(store.path_for("").is_err());
        assert_eq!(
            store.path_for("normandy/all.json").unwrap(),
            PathBuf::from("/tmp/stage/normandy/all.json")
        );
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp_dir.path());

        store.put("d/all.json", b"{}".to_vec(), "application/json").await.unwrap();
        store.put("d/all.json", b"{\"a\":1}".to_vec(), "application/json").await.unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("d/all.json")).unwrap();
        assert_eq!(content, "{\"a\":1}");
    }
}
