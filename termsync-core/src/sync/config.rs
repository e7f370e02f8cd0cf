//! Persisted sync state.

use crate::platform::get_default_state_path;
use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Sync settings and bookkeeping for this machine.
///
/// Only the PBKDF2 hash of the master password is kept here, never the
/// password itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub enabled: bool,
    pub auto_sync_on_change: bool,
    pub auto_sync_on_startup: bool,
    /// Zero disables the periodic sync
    pub sync_interval_minutes: u64,
    /// Opaque credentials of the remote store, owned by the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_tokens: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_password_salt: Option<String>,
    /// Epoch milliseconds of the last successful cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_file_id: Option<String>,
    /// Fingerprint of the syncable content last uploaded or applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_fingerprint: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_sync_on_change: true,
            auto_sync_on_startup: true,
            sync_interval_minutes: 0,
            auth_tokens: None,
            master_password_hash: None,
            master_password_salt: None,
            last_sync_time: None,
            last_sync_error: None,
            last_sync_host: None,
            remote_file_id: None,
            last_sync_fingerprint: None,
        }
    }
}

impl SyncSettings {
    pub fn has_master_password(&self) -> bool {
        self.master_password_hash.is_some() && self.master_password_salt.is_some()
    }
}

/// Where [`SyncSettings`] are persisted
pub trait StateStore: Send + Sync {
    /// Load settings; defaults when nothing was saved yet
    fn load(&self) -> Result<SyncSettings>;

    fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// Settings kept as a JSON file
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/termsync/state.json`
    pub fn default_path() -> PathBuf {
        get_default_state_path()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<SyncSettings> {
        if !self.path.exists() {
            return Ok(SyncSettings::default());
        }

        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(SyncSettings::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Settings kept in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    settings: Mutex<SyncSettings>,
}

impl MemoryStateStore {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    pub fn snapshot(&self) -> SyncSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SyncSettings> {
        Ok(self.snapshot())
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| SyncError::Storage("state store lock poisoned".to_string()))?;
        *guard = settings.clone();
        Ok(())
    }
}
