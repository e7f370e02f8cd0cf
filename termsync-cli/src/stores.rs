//! File-backed stores for the command-line host.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use termsync_core::sync::{BlobStore, BlobVersion, ConfigStore, ExtensionLister};
use termsync_core::{RawConfig, Result, SyncError};

/// Write `bytes` next to `path` and rename over it
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// The terminal's configuration as a JSON file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn read_config(&self) -> Result<RawConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(RawConfig::Object(Default::default()))
            }
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(RawConfig::Object(Default::default()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_config(&self, config: &RawConfig) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.path, &bytes).await
    }
}

/// A directory standing in for remote storage
///
/// Each blob name is a subdirectory holding one file per uploaded
/// version, numbered from 1. The highest number is the current contents.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Version numbers of `name`, ascending
    async fn versions(&self, name: &str) -> Result<Vec<u64>> {
        let dir = self.blob_dir(name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(number) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(".blob"))
                .and_then(|n| n.parse::<u64>().ok())
            {
                versions.push(number);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn version_path(&self, name: &str, version: u64) -> PathBuf {
        self.blob_dir(name).join(format!("{version}.blob"))
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    fn is_connected(&self) -> bool {
        self.root.is_dir()
    }

    async fn download(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(latest) = self.versions(name).await?.last().copied() else {
            return Ok(None);
        };
        Ok(Some(tokio::fs::read(self.version_path(name, latest)).await?))
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let next = self.versions(name).await?.last().map_or(1, |v| v + 1);
        write_atomic(&self.version_path(name, next), bytes).await?;
        Ok(next.to_string())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<BlobVersion>> {
        let mut listed = Vec::new();
        for version in self.versions(name).await?.into_iter().rev() {
            let metadata = tokio::fs::metadata(self.version_path(name, version)).await?;
            let modified_time = metadata
                .modified()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
                .unwrap_or_default();
            listed.push(BlobVersion {
                id: version.to_string(),
                modified_time,
                size: metadata.len(),
            });
        }
        Ok(listed)
    }

    async fn download_version(&self, name: &str, version_id: &str) -> Result<Vec<u8>> {
        let version: u64 = version_id
            .parse()
            .map_err(|_| SyncError::Integrity(format!("invalid version id {version_id}")))?;
        match tokio::fs::read(self.version_path(name, version)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SyncError::Integrity(
                format!("version {version_id} of {name} not found"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Plugins installed as subdirectories of one directory
#[derive(Debug, Clone)]
pub struct DirExtensionLister {
    dir: PathBuf,
}

impl DirExtensionLister {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExtensionLister for DirExtensionLister {
    fn installed_extension_names(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}
