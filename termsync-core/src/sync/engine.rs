//! Sync orchestrator: runs sanitize/encrypt/upload and download/decrypt/merge/apply cycles.

use crate::crypto::{
    decrypt_object, encrypt_object, hash_password, verify_password, EncryptedEnvelope,
    MasterPassword,
};
use crate::merge::{ConflictRecord, Merger};
use crate::models::{
    RawConfig, SyncPayload, SyncableGroup, SyncableProfile, SyncableSettings, VaultBlob,
};
use crate::pathmap::PathMapper;
use crate::sanitize::Sanitizer;
use crate::sync::config::{StateStore, SyncSettings};
use crate::sync::retry::RetryPolicy;
use crate::sync::state::SyncPhase;
use crate::sync::store::{
    BlobStore, BlobVersion, ConfigStore, ExtensionLister, HostnameProvider, SystemHostname,
};
use crate::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Name of the encrypted blob in the remote store
pub const REMOTE_FILE_NAME: &str = "termsync-config.enc.json";

/// What a cycle ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    None,
    Upload,
    Download,
    Merge,
}

/// Result of a public orchestrator operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub action: SyncAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub conflicts: Vec<ConflictRecord>,
    pub added_profiles: Vec<String>,
    pub added_groups: Vec<String>,
    /// Extensions installed on the uploading machine but not here
    pub missing_plugins: Vec<String>,
}

impl SyncOutcome {
    fn completed(action: SyncAction) -> Self {
        Self {
            success: true,
            action,
            error: None,
            conflicts: Vec::new(),
            added_profiles: Vec::new(),
            added_groups: Vec::new(),
            missing_plugins: Vec::new(),
        }
    }

    fn failed(err: &SyncError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            ..Self::completed(SyncAction::None)
        }
    }
}

/// Snapshot of the orchestrator for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    pub password_set: bool,
    pub unlocked: bool,
    pub phase: SyncPhase,
    pub last_sync_time: Option<i64>,
    pub last_sync_error: Option<String>,
    pub last_sync_host: Option<String>,
    pub remote_file_id: Option<String>,
}

/// How a downloaded payload is combined with local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullMode {
    /// Timestamp-based merge
    Merge,
    /// Remote wins every field it defines
    Replace,
}

#[derive(Debug, Clone, Copy)]
enum RemoteSource<'a> {
    Current,
    Version(&'a str),
}

/// What the inbound half of a cycle did
struct Pulled {
    conflicts: Vec<ConflictRecord>,
    added_profiles: Vec<String>,
    added_groups: Vec<String>,
    missing_plugins: Vec<String>,
    wrote_local: bool,
    /// Local content now matches the remote blob
    in_step: bool,
}

impl Pulled {
    fn into_outcome(self, action: SyncAction) -> SyncOutcome {
        SyncOutcome {
            conflicts: self.conflicts,
            added_profiles: self.added_profiles,
            added_groups: self.added_groups,
            missing_plugins: self.missing_plugins,
            ..SyncOutcome::completed(action)
        }
    }
}

/// Sequences the sync pipeline against the host's stores.
///
/// Every operation that touches the stores holds the cycle guard, so at
/// most one cycle runs at a time and callers queue behind it.
pub struct SyncOrchestrator {
    config: Arc<dyn ConfigStore>,
    blobs: Arc<dyn BlobStore>,
    state: Arc<dyn StateStore>,
    hostname: Arc<dyn HostnameProvider>,
    extensions: Option<Arc<dyn ExtensionLister>>,
    sanitizer: Sanitizer,
    merger: Merger,
    retry: RetryPolicy,
    password: Mutex<Option<MasterPassword>>,
    phase: Mutex<SyncPhase>,
    cycle: tokio::sync::Mutex<()>,
}

impl SyncOrchestrator {
    /// Create an orchestrator for this machine's home directory
    pub fn new(
        config: Arc<dyn ConfigStore>,
        blobs: Arc<dyn BlobStore>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        let mapper = PathMapper::current();
        Self {
            config,
            blobs,
            state,
            hostname: Arc::new(SystemHostname),
            extensions: None,
            sanitizer: Sanitizer::new(mapper.clone()),
            merger: Merger::new(mapper),
            retry: RetryPolicy::default(),
            password: Mutex::new(None),
            phase: Mutex::new(SyncPhase::Idle),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_mapper(mut self, mapper: PathMapper) -> Self {
        self.sanitizer = Sanitizer::new(mapper.clone());
        self.merger = Merger::new(mapper);
        self
    }

    pub fn with_hostname(mut self, hostname: Arc<dyn HostnameProvider>) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<dyn ExtensionLister>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current cycle phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the master password is held in memory
    pub fn is_unlocked(&self) -> bool {
        self.session().as_ref().is_some_and(|p| !p.is_empty())
    }

    // ---- Master password session ----

    /// Set the master password on a machine that has none yet
    ///
    /// If a password is already set, this only unlocks, and fails when
    /// `password` does not match it.
    pub async fn set_master_password(&self, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(SyncError::InvalidPassword);
        }

        let _cycle = self.cycle.lock().await;
        let mut settings = self.state.load()?;

        match (
            &settings.master_password_hash,
            &settings.master_password_salt,
        ) {
            (Some(hash), Some(salt)) => {
                if !verify_password(password, hash, salt) {
                    return Err(SyncError::InvalidPassword);
                }
            }
            _ => {
                let hashed = hash_password(password);
                settings.master_password_hash = Some(hashed.hash);
                settings.master_password_salt = Some(hashed.salt);
                self.state.save(&settings)?;
                info!("Master password set");
            }
        }

        self.store_password(password);
        Ok(())
    }

    /// Verify the master password and hold it for this session
    pub fn unlock(&self, password: &str) -> Result<()> {
        let settings = self.state.load()?;
        let (Some(hash), Some(salt)) = (
            settings.master_password_hash.as_deref(),
            settings.master_password_salt.as_deref(),
        ) else {
            return Err(SyncError::PasswordNotSet);
        };

        if !verify_password(password, hash, salt) {
            warn!("Unlock attempt with wrong master password");
            return Err(SyncError::InvalidPassword);
        }

        self.store_password(password);
        info!("Sync session unlocked");
        Ok(())
    }

    /// Forget the master password, overwriting it in memory
    pub fn lock(&self) {
        if let Some(mut password) = self.session().take() {
            password.clear();
        }
        info!("Sync session locked");
    }

    /// Change the master password and re-encrypt the remote blob under it
    pub async fn change_master_password(&self, old: &str, new: &str) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("change_password", err),
        };
        let result = self.change_password_locked(&mut settings, old, new).await;
        self.finish("change_password", &mut settings, result)
    }

    async fn change_password_locked(
        &self,
        settings: &mut SyncSettings,
        old: &str,
        new: &str,
    ) -> Result<SyncOutcome> {
        if !settings.enabled {
            return Err(SyncError::Disabled);
        }
        if new.is_empty() {
            return Err(SyncError::InvalidPassword);
        }
        let (Some(hash), Some(salt)) = (
            settings.master_password_hash.as_deref(),
            settings.master_password_salt.as_deref(),
        ) else {
            return Err(SyncError::PasswordNotSet);
        };
        if !verify_password(old, hash, salt) {
            return Err(SyncError::InvalidPassword);
        }
        if !self.blobs.is_connected() {
            return Err(SyncError::NotConnected);
        }

        self.set_phase(SyncPhase::Downloading);
        let bytes = self
            .retry
            .run("download", || self.blobs.download(REMOTE_FILE_NAME))
            .await?;

        match bytes {
            Some(bytes) => {
                self.set_phase(SyncPhase::Decrypting);
                let payload = decode_payload(&bytes, old)?;
                self.upload_payload(settings, &payload, new).await?;
            }
            None => {
                self.set_phase(SyncPhase::Idle);
                self.push_local(settings, new).await?;
            }
        }

        let hashed = hash_password(new);
        settings.master_password_hash = Some(hashed.hash);
        settings.master_password_salt = Some(hashed.salt);
        self.store_password(new);
        info!("Master password changed, remote blob re-encrypted");

        Ok(SyncOutcome::completed(SyncAction::Upload))
    }

    // ---- Cycles ----

    /// Full cycle: download and merge, then upload if remote is behind
    pub async fn sync(&self) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("sync", err),
        };
        let result = self.sync_locked(&mut settings).await;
        self.finish("sync", &mut settings, result)
    }

    async fn sync_locked(&self, settings: &mut SyncSettings) -> Result<SyncOutcome> {
        let password = self.session_password(settings)?;

        let pulled = self
            .pull_remote(settings, &password, RemoteSource::Current, PullMode::Merge)
            .await?;
        let Some(pulled) = pulled else {
            info!("No remote configuration yet, uploading local state");
            self.push_local(settings, &password).await?;
            return Ok(SyncOutcome::completed(SyncAction::Upload));
        };

        let action = if pulled.in_step {
            if pulled.wrote_local {
                SyncAction::Download
            } else {
                SyncAction::None
            }
        } else {
            self.push_local(settings, &password).await?;
            if pulled.wrote_local {
                SyncAction::Merge
            } else {
                SyncAction::Upload
            }
        };

        Ok(pulled.into_outcome(action))
    }

    /// Outbound half only; skipped when nothing changed since the last sync
    pub async fn upload(&self) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("upload", err),
        };
        let result = self.upload_locked(&mut settings, false).await;
        self.finish("upload", &mut settings, result)
    }

    /// Outbound half, overwriting remote regardless of its contents
    pub async fn force_upload(&self) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("force_upload", err),
        };
        let result = self.upload_locked(&mut settings, true).await;
        self.finish("force_upload", &mut settings, result)
    }

    async fn upload_locked(&self, settings: &mut SyncSettings, force: bool) -> Result<SyncOutcome> {
        let password = self.session_password(settings)?;

        self.set_phase(SyncPhase::Sanitizing);
        let raw = self.config.read_config().await?;
        let payload = self.create_payload(&raw);

        if !force && settings.last_sync_fingerprint.as_deref() == Some(fingerprint(&payload).as_str()) {
            debug!("Local configuration unchanged since last sync, skipping upload");
            self.set_phase(SyncPhase::Idle);
            return Ok(SyncOutcome::completed(SyncAction::None));
        }

        self.upload_payload(settings, &payload, &password).await?;
        Ok(SyncOutcome::completed(SyncAction::Upload))
    }

    /// Inbound half only
    pub async fn pull(&self) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("pull", err),
        };
        let result = self.pull_locked(&mut settings, RemoteSource::Current, PullMode::Merge).await;
        self.finish("pull", &mut settings, result)
    }

    /// Inbound half where remote wins every conflict
    pub async fn force_download(&self) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("force_download", err),
        };
        let result = self
            .pull_locked(&mut settings, RemoteSource::Current, PullMode::Replace)
            .await;
        self.finish("force_download", &mut settings, result)
    }

    async fn pull_locked(
        &self,
        settings: &mut SyncSettings,
        source: RemoteSource<'_>,
        mode: PullMode,
    ) -> Result<SyncOutcome> {
        let password = self.session_password(settings)?;

        match self.pull_remote(settings, &password, source, mode).await? {
            Some(pulled) => {
                let action = if pulled.wrote_local {
                    SyncAction::Download
                } else {
                    SyncAction::None
                };
                Ok(pulled.into_outcome(action))
            }
            None if mode == PullMode::Replace => Err(SyncError::Integrity(
                "no remote configuration to download".to_string(),
            )),
            None => Ok(SyncOutcome::completed(SyncAction::None)),
        }
    }

    /// Whether local content differs from what was last synced
    pub async fn has_local_changes(&self) -> Result<bool> {
        let _cycle = self.cycle.lock().await;
        let settings = self.state.load()?;
        let raw = self.config.read_config().await?;
        let current = fingerprint(&self.create_payload(&raw));
        Ok(settings.last_sync_fingerprint.as_deref() != Some(current.as_str()))
    }

    // ---- Versions ----

    /// Stored revisions of the remote blob, newest first
    pub async fn list_versions(&self) -> Result<Vec<BlobVersion>> {
        let _cycle = self.cycle.lock().await;
        if !self.blobs.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.retry
            .run("list_versions", || self.blobs.list_versions(REMOTE_FILE_NAME))
            .await
    }

    /// Apply a stored revision locally and make it the current remote
    pub async fn restore_version(&self, version_id: &str) -> SyncOutcome {
        let _cycle = self.cycle.lock().await;
        let mut settings = match self.state.load() {
            Ok(settings) => settings,
            Err(err) => return self.abort("restore_version", err),
        };
        let result = self.restore_locked(&mut settings, version_id).await;
        self.finish("restore_version", &mut settings, result)
    }

    async fn restore_locked(
        &self,
        settings: &mut SyncSettings,
        version_id: &str,
    ) -> Result<SyncOutcome> {
        let password = self.session_password(settings)?;

        let pulled = self
            .pull_remote(
                settings,
                &password,
                RemoteSource::Version(version_id),
                PullMode::Replace,
            )
            .await?
            .ok_or_else(|| SyncError::Integrity(format!("version {version_id} not found")))?;
        self.push_local(settings, &password).await?;

        info!(version_id, "Restored remote version");
        Ok(pulled.into_outcome(SyncAction::Merge))
    }

    // ---- Status ----

    pub fn status(&self) -> Result<SyncStatus> {
        let settings = self.state.load()?;
        Ok(SyncStatus {
            enabled: settings.enabled,
            password_set: settings.has_master_password(),
            unlocked: self.is_unlocked(),
            phase: self.phase(),
            last_sync_time: settings.last_sync_time,
            last_sync_error: settings.last_sync_error,
            last_sync_host: settings.last_sync_host,
            remote_file_id: settings.remote_file_id,
        })
    }

    /// Forget the remote binding; the master password hash is kept
    pub async fn disconnect(&self) -> Result<()> {
        let _cycle = self.cycle.lock().await;
        let mut settings = self.state.load()?;
        settings.auth_tokens = None;
        settings.remote_file_id = None;
        self.state.save(&settings)?;
        info!("Disconnected from remote storage");
        Ok(())
    }

    // ---- Internals ----

    fn session(&self) -> MutexGuard<'_, Option<MasterPassword>> {
        self.password.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_password(&self, password: &str) {
        *self.session() = Some(MasterPassword::new(password.to_string()));
    }

    /// Check preconditions and copy out the session password
    fn session_password(&self, settings: &SyncSettings) -> Result<Zeroizing<String>> {
        if !settings.enabled {
            return Err(SyncError::Disabled);
        }
        if !settings.has_master_password() {
            return Err(SyncError::PasswordNotSet);
        }
        let password = self
            .session()
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| Zeroizing::new(p.expose().to_string()))
            .ok_or(SyncError::Locked)?;
        if !self.blobs.is_connected() {
            return Err(SyncError::NotConnected);
        }
        Ok(password)
    }

    fn set_phase(&self, next: SyncPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == next {
            return;
        }
        if !phase.can_transition_to(next) {
            warn!(from = ?*phase, to = ?next, "Unexpected sync phase transition");
        }
        *phase = next;
    }

    fn installed_plugins(&self) -> Vec<String> {
        self.extensions
            .as_ref()
            .map(|lister| lister.installed_extension_names())
            .unwrap_or_default()
    }

    fn create_payload(&self, raw: &RawConfig) -> SyncPayload {
        self.sanitizer.create_payload(
            raw,
            &self.hostname.current_hostname(),
            &self.installed_plugins(),
        )
    }

    /// Local payload for merging
    ///
    /// When nothing changed locally since the last sync, the payload
    /// carries the last sync time instead of now, so that newer remote
    /// edits win over an untouched machine.
    fn local_payload(&self, raw: &RawConfig, settings: &SyncSettings) -> SyncPayload {
        let mut payload = self.create_payload(raw);
        if let (Some(last), Some(time)) = (&settings.last_sync_fingerprint, settings.last_sync_time)
        {
            if *last == fingerprint(&payload) {
                debug!(last_sync_time = time, "Local configuration unchanged since last sync");
                payload.last_updated = time;
            }
        }
        payload
    }

    fn record_synced(settings: &mut SyncSettings, fingerprint: String) {
        settings.last_sync_fingerprint = Some(fingerprint);
        settings.last_sync_time = Some(chrono::Utc::now().timestamp_millis());
    }

    /// Download, decrypt, merge and write back
    ///
    /// Returns `None` when there is nothing stored remotely. Local state is
    /// only written after the remote payload decrypted and validated.
    async fn pull_remote(
        &self,
        settings: &mut SyncSettings,
        password: &str,
        source: RemoteSource<'_>,
        mode: PullMode,
    ) -> Result<Option<Pulled>> {
        self.set_phase(SyncPhase::Downloading);
        let bytes = match source {
            RemoteSource::Current => {
                self.retry
                    .run("download", || self.blobs.download(REMOTE_FILE_NAME))
                    .await?
            }
            RemoteSource::Version(id) => Some(
                self.retry
                    .run("download_version", || {
                        self.blobs.download_version(REMOTE_FILE_NAME, id)
                    })
                    .await?,
            ),
        };
        let Some(bytes) = bytes else {
            self.set_phase(SyncPhase::Idle);
            return Ok(None);
        };

        self.set_phase(SyncPhase::Decrypting);
        let remote = decode_payload(&bytes, password)?;
        info!(
            source_host = %remote.source_host,
            profiles = remote.profiles.len(),
            "Downloaded remote configuration"
        );

        self.set_phase(SyncPhase::Merging);
        let raw = self.config.read_config().await?;
        let local = self.local_payload(&raw, settings);

        let (merged, conflicts, added_profiles, added_groups) = match mode {
            PullMode::Merge => {
                let result = self.merger.merge_payloads(&local, &remote, &raw);
                (
                    result.payload,
                    result.conflicts,
                    result.added_profiles,
                    result.added_groups,
                )
            }
            PullMode::Replace => {
                let known: HashSet<&str> = local.profiles.iter().map(|p| p.id.as_str()).collect();
                let added_profiles = remote
                    .profiles
                    .iter()
                    .filter(|p| !known.contains(p.id.as_str()))
                    .map(|p| p.id.clone())
                    .collect();
                let groups = self.merger.merge_groups(&local.groups, &remote.groups);
                (remote.clone(), Vec::new(), added_profiles, groups.added)
            }
        };
        for conflict in &conflicts {
            info!(
                profile_id = %conflict.profile_id,
                resolution = ?conflict.resolution,
                "Resolved profile conflict"
            );
        }

        let updated = self.merger.apply_to_config(&raw, &merged);
        let wrote_local = updated != raw;
        if wrote_local {
            self.set_phase(SyncPhase::WritingLocal);
            self.config.write_config(&updated).await?;
            info!(
                added_profiles = added_profiles.len(),
                added_groups = added_groups.len(),
                "Wrote merged configuration"
            );
        }

        let missing_plugins = self.missing_plugins(&remote);

        let local_fingerprint = fingerprint(&self.create_payload(&updated));
        let in_step = local_fingerprint == fingerprint(&remote);
        if in_step {
            Self::record_synced(settings, local_fingerprint);
        }

        self.set_phase(SyncPhase::Idle);
        Ok(Some(Pulled {
            conflicts,
            added_profiles,
            added_groups,
            missing_plugins,
            wrote_local,
            in_step,
        }))
    }

    fn missing_plugins(&self, remote: &SyncPayload) -> Vec<String> {
        let Some(lister) = &self.extensions else {
            return Vec::new();
        };
        let installed: HashSet<String> = lister.installed_extension_names().into_iter().collect();

        let missing: Vec<String> = remote
            .installed_plugins
            .iter()
            .filter(|name| !installed.contains(*name))
            .cloned()
            .collect();
        for name in &missing {
            warn!(plugin = %name, source_host = %remote.source_host, "Plugin missing on this machine");
        }
        missing
    }

    /// Sanitize the current configuration and upload it
    async fn push_local(&self, settings: &mut SyncSettings, password: &str) -> Result<()> {
        self.set_phase(SyncPhase::Sanitizing);
        let raw = self.config.read_config().await?;
        let payload = self.create_payload(&raw);
        self.upload_payload(settings, &payload, password).await
    }

    async fn upload_payload(
        &self,
        settings: &mut SyncSettings,
        payload: &SyncPayload,
        password: &str,
    ) -> Result<()> {
        self.set_phase(SyncPhase::Encrypting);
        let envelope = encrypt_object(payload, password)?;
        let bytes = serde_json::to_vec(&envelope)?;

        self.set_phase(SyncPhase::Uploading);
        let file_id = self
            .retry
            .run("upload", || self.blobs.upload(REMOTE_FILE_NAME, &bytes))
            .await?;

        settings.remote_file_id = Some(file_id);
        Self::record_synced(settings, fingerprint(payload));
        info!(
            profiles = payload.profiles.len(),
            bytes = bytes.len(),
            "Uploaded configuration"
        );
        self.set_phase(SyncPhase::Idle);
        Ok(())
    }

    /// Record the outcome of an operation and persist state
    fn finish(
        &self,
        operation: &str,
        settings: &mut SyncSettings,
        result: Result<SyncOutcome>,
    ) -> SyncOutcome {
        let outcome = match result {
            Ok(outcome) => {
                self.set_phase(SyncPhase::Idle);
                settings.last_sync_error = None;
                settings.last_sync_host = Some(self.hostname.current_hostname());
                info!(
                    operation,
                    action = ?outcome.action,
                    conflicts = outcome.conflicts.len(),
                    "Sync operation completed"
                );
                outcome
            }
            Err(err) => {
                self.set_phase(SyncPhase::Error);
                settings.last_sync_error = Some(err.to_string());
                warn!(operation, kind = ?err.kind(), error = %err, "Sync operation failed");
                SyncOutcome::failed(&err)
            }
        };

        if let Err(err) = self.state.save(settings) {
            warn!(error = %err, "Failed to persist sync state");
        }
        outcome
    }

    /// Fail an operation before any state could be loaded
    fn abort(&self, operation: &str, err: SyncError) -> SyncOutcome {
        self.set_phase(SyncPhase::Error);
        warn!(operation, error = %err, "Failed to load sync state");
        SyncOutcome::failed(&err)
    }
}

/// Parse, decrypt and validate a remote blob
fn decode_payload(bytes: &[u8], password: &str) -> Result<SyncPayload> {
    let envelope: EncryptedEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| SyncError::Integrity(format!("remote blob is not an envelope: {e}")))?;
    let payload: SyncPayload = decrypt_object(&envelope, password).ok_or(SyncError::Decryption)?;
    payload.validate().map_err(SyncError::Integrity)?;
    Ok(payload)
}

#[derive(Serialize)]
struct Fingerprinted<'a> {
    profiles: Vec<&'a SyncableProfile>,
    groups: Vec<&'a SyncableGroup>,
    vault: Option<&'a VaultBlob>,
    settings: &'a SyncableSettings,
}

/// Digest of the syncable content of a payload
///
/// Profiles and groups are ordered by id. Timestamps, the source host,
/// the format version and the plugin list do not contribute.
pub fn fingerprint(payload: &SyncPayload) -> String {
    let mut profiles: Vec<&SyncableProfile> = payload.profiles.iter().collect();
    profiles.sort_by(|a, b| a.id.cmp(&b.id));
    let mut groups: Vec<&SyncableGroup> = payload.groups.iter().collect();
    groups.sort_by(|a, b| a.id.cmp(&b.id));

    let canonical = serde_json::to_vec(&Fingerprinted {
        profiles,
        groups,
        vault: payload.vault.as_ref(),
        settings: &payload.settings,
    })
    .unwrap_or_default();

    STANDARD.encode(Sha256::digest(&canonical))
}
