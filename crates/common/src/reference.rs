use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::crypto::{Secret, SecretError};

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("reference copy at {path} is unavailable: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference copy is corrupt: {0}")]
    Corrupt(#[from] SecretError),
    #[error("no reference copy has been written")]
    Missing,
    #[error("reference store error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Verification artifact shared by the depositor and the authority
///
/// The depositor writes the secret once, the authority reads it once after
/// reconstruction. Implementations only need to hold a single secret.
#[async_trait]
pub trait ReferenceStore: Send + Sync + Debug + 'static {
    /// Persist the reference copy of the secret
    async fn write(&self, secret: &Secret) -> Result<(), ReferenceError>;

    /// Read back the reference copy
    async fn read(&self) -> Result<Secret, ReferenceError>;
}

/// A file holding exactly the raw secret bytes
#[derive(Debug, Clone)]
pub struct FileReferenceStore {
    path: PathBuf,
}

impl FileReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ReferenceError {
        ReferenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ReferenceStore for FileReferenceStore {
    async fn write(&self, secret: &Secret) -> Result<(), ReferenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        tokio::fs::write(&self.path, secret.bytes())
            .await
            .map_err(|e| self.io_error(e))
    }

    async fn read(&self) -> Result<Secret, ReferenceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(Secret::from_slice(&bytes)?)
    }
}

/// In-memory reference slot, cheap to clone and share with tests
#[derive(Debug, Clone, Default)]
pub struct MemoryReferenceStore {
    inner: Arc<RwLock<Option<Secret>>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, without going through the async trait
    pub fn get(&self) -> Option<Secret> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn write(&self, secret: &Secret) -> Result<(), ReferenceError> {
        let mut slot = self
            .inner
            .write()
            .map_err(|e| anyhow::anyhow!("failed to acquire write lock: {}", e))?;
        *slot = Some(secret.clone());
        Ok(())
    }

    async fn read(&self) -> Result<Secret, ReferenceError> {
        let slot = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("failed to acquire read lock: {}", e))?;
        slot.clone().ok_or(ReferenceError::Missing)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FileReferenceStore::new(temp.path().join("usb/reference.key"));
        let secret = Secret::generate();

        store.write(&secret).await.unwrap();
        let on_disk = std::fs::read(store.path()).unwrap();
        assert_eq!(on_disk, secret.bytes());
        assert_eq!(store.read().await.unwrap(), secret);
    }

    #[tokio::test]
    async fn test_file_store_missing() {
        let temp = TempDir::new().unwrap();
        let store = FileReferenceStore::new(temp.path().join("nothing-here"));
        assert!(matches!(
            store.read().await,
            Err(ReferenceError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("reference.key");
        std::fs::write(&path, b"too short").unwrap();
        let store = FileReferenceStore::new(path);
        assert!(matches!(
            store.read().await,
            Err(ReferenceError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_unwritable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        // parent is a regular file, so the directory cannot be created
        let store = FileReferenceStore::new(blocker.join("reference.key"));
        assert!(store.write(&Secret::generate()).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryReferenceStore::new();
        assert!(matches!(store.read().await, Err(ReferenceError::Missing)));

        let secret = Secret::generate();
        store.write(&secret).await.unwrap();
        assert_eq!(store.read().await.unwrap(), secret);
        assert_eq!(store.clone().get(), Some(secret));
    }
}
