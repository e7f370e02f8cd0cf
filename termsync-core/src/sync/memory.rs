//! In-memory collaborators for tests and embedding.

use crate::models::RawConfig;
use crate::sync::store::{BlobStore, BlobVersion, ConfigStore, HostnameProvider};
use crate::{Result, SyncError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Configuration tree held in memory
#[derive(Debug)]
pub struct MemoryConfigStore {
    inner: Mutex<ConfigInner>,
}

#[derive(Debug)]
struct ConfigInner {
    config: RawConfig,
    writes: usize,
}

impl MemoryConfigStore {
    pub fn new(config: RawConfig) -> Self {
        Self {
            inner: Mutex::new(ConfigInner { config, writes: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConfigInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current configuration
    pub fn snapshot(&self) -> RawConfig {
        self.lock().config.clone()
    }

    /// Replace the configuration as a user edit would, without counting a write
    pub fn set(&self, config: RawConfig) {
        self.lock().config = config;
    }

    /// Number of `write_config` calls so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn read_config(&self) -> Result<RawConfig> {
        Ok(self.snapshot())
    }

    async fn write_config(&self, config: &RawConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.config = config.clone();
        inner.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredVersion {
    id: String,
    modified_time: i64,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct BlobInner {
    files: HashMap<String, Vec<StoredVersion>>,
    connected: bool,
    failures_remaining: u32,
    calls: usize,
    uploads: usize,
    next_version: u64,
}

/// Versioned blob store held in memory
///
/// Every upload is kept as a new version. Failures can be injected to
/// exercise retry handling.
#[derive(Debug)]
pub struct MemoryBlobStore {
    inner: Mutex<BlobInner>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BlobInner {
                files: HashMap::new(),
                connected: true,
                failures_remaining: 0,
                calls: 0,
                uploads: 0,
                next_version: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BlobInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` remote calls fail with a storage error
    pub fn fail_next(&self, count: u32) {
        self.lock().failures_remaining = count;
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Remote calls made so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Successful uploads so far
    pub fn upload_count(&self) -> usize {
        self.lock().uploads
    }

    /// Latest contents of `name`
    pub fn latest(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(name)
            .and_then(|versions| versions.last())
            .map(|v| v.bytes.clone())
    }

    /// Count the call and consume an injected failure, if any
    fn begin_call(inner: &mut BlobInner) -> Result<()> {
        inner.calls += 1;
        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            return Err(SyncError::Storage("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn download(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.lock();
        Self::begin_call(&mut inner)?;
        Ok(inner
            .files
            .get(name)
            .and_then(|versions| versions.last())
            .map(|v| v.bytes.clone()))
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let mut inner = self.lock();
        Self::begin_call(&mut inner)?;

        let id = format!("v{}", inner.next_version);
        inner.next_version += 1;
        inner.uploads += 1;
        inner
            .files
            .entry(name.to_string())
            .or_default()
            .push(StoredVersion {
                id: id.clone(),
                modified_time: chrono::Utc::now().timestamp_millis(),
                bytes: bytes.to_vec(),
            });
        Ok(id)
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<BlobVersion>> {
        let mut inner = self.lock();
        Self::begin_call(&mut inner)?;

        let versions = inner.files.get(name).map(Vec::as_slice).unwrap_or_default();
        Ok(versions
            .iter()
            .rev()
            .map(|v| BlobVersion {
                id: v.id.clone(),
                modified_time: v.modified_time,
                size: v.bytes.len() as u64,
            })
            .collect())
    }

    async fn download_version(&self, name: &str, version_id: &str) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        Self::begin_call(&mut inner)?;

        inner
            .files
            .get(name)
            .and_then(|versions| versions.iter().find(|v| v.id == version_id))
            .map(|v| v.bytes.clone())
            .ok_or_else(|| SyncError::Integrity(format!("no version {version_id} of {name}")))
    }
}

/// Fixed hostname
#[derive(Debug, Clone)]
pub struct StaticHostname(pub String);

impl HostnameProvider for StaticHostname {
    fn current_hostname(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn config_store_counts_writes() {
        let store = MemoryConfigStore::new(json!({ "a": 1 }));

        store.set(json!({ "a": 2 }));
        assert_eq!(store.write_count(), 0);

        store.write_config(&json!({ "a": 3 })).await.unwrap();
        assert_eq!(store.read_config().await.unwrap(), json!({ "a": 3 }));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn blob_store_keeps_versions() {
        let store = MemoryBlobStore::new();
        assert!(store.download("f").await.unwrap().is_none());

        let first = store.upload("f", b"one").await.unwrap();
        let second = store.upload("f", b"two").await.unwrap();

        assert_eq!(store.download("f").await.unwrap().unwrap(), b"two");
        let versions = store.list_versions("f").await.unwrap();
        assert_eq!(
            versions.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            vec![second.as_str(), first.as_str()]
        );
        assert_eq!(store.download_version("f", &first).await.unwrap(), b"one");
        assert!(matches!(
            store.download_version("f", "v99").await,
            Err(SyncError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryBlobStore::new();
        store.fail_next(2);

        assert!(store.download("f").await.is_err());
        assert!(store.upload("f", b"x").await.is_err());
        assert!(store.upload("f", b"x").await.is_ok());
        assert_eq!(store.call_count(), 3);
        assert_eq!(store.upload_count(), 1);
    }
}
