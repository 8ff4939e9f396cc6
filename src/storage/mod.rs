//! Durable object storage and the persisted session layout.
//!
//! Layout per resource:
//!
//! ```text
//! <root>/<resource_id>/
//!   metadata.json    source metadata
//!   transcript.json  structured transcript (speaker ids, raw timings)
//!   transcript.txt   display transcript
//!   summary.md       synthesis output
//!   audio.mp3        finished asset
//!   exports/         derived clips
//! ```

use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A durable object store keyed by relative path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, or None when it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store an object, overwriting any existing one.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Filesystem-backed object store.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether the backing storage can currently serve reads.
    pub fn available(&self) -> bool {
        self.root.is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Path of a resource's persisted audio asset.
    pub fn audio_path(&self, resource_id: &str) -> PathBuf {
        self.resolve(&format!("{}/audio.mp3", resource_id))
    }

    /// Copy a large local file into the store without buffering it.
    pub async fn put_file(&self, key: &str, source: &Path) -> Result<()> {
        let dest = self.resolve(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, &dest).await?;
        Ok(())
    }

    /// Create the per-resource directory skeleton, including `exports/`.
    pub async fn prepare_session(&self, resource_id: &str) -> Result<()> {
        let dir = self.resolve(resource_id);
        tokio::fs::create_dir_all(dir.join("exports"))
            .await
            .map_err(|e| {
                OpptakError::StorageUnavailable(format!("Cannot create session dir: {e}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.resolve(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OpptakError::StorageUnavailable(e.to_string())),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let dest = self.resolve(key);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.put("s1/metadata.json", b"{}").await.unwrap();
        let fetched = store.get("s1/metadata.json").await.unwrap();
        assert_eq!(fetched.as_deref(), Some(b"{}".as_slice()));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.get("nope/audio.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.prepare_session("s1").await.unwrap();
        assert!(dir.path().join("s1/exports").is_dir());

        assert_eq!(
            store.audio_path("s1"),
            dir.path().join("s1").join("audio.mp3")
        );
    }

    #[tokio::test]
    async fn test_availability_probe() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("missing"));
        assert!(!store.available());

        let present = LocalObjectStore::new(dir.path());
        assert!(present.available());
    }
}
