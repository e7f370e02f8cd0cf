//! Reconciliation of local and remote payloads.
//!
//! Merging happens at the syncable level, but the result is written back
//! into the raw configuration: the raw local profile is the base, so
//! anything the sanitizer stripped (key material, scripts, local paths)
//! survives a merge untouched.

pub mod conflict;

pub use conflict::{ConflictRecord, ConflictResolver, Resolution};

use crate::models::{RawConfig, SyncPayload, SyncableGroup, SyncableProfile, SyncableSettings};
use crate::pathmap::PathMapper;
use crate::sanitize::profile::{
    restrict_options, restrict_profile, CWD_OPTION, OPTION_FIELDS, PROFILE_FIELDS,
};
use crate::sanitize::settings::{
    restrict_settings, slot_mut, MapSectionId, BACKGROUND_IMAGE_FIELD, LIST_SECTIONS,
    MAP_SECTIONS,
};
use crate::sanitize::Sanitizer;
use crate::tree::{deep_merge, is_blank, non_empty_str};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const PASSWORD_OPTION: &str = "password";

/// Outcome of merging the group lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMerge {
    pub merged: Vec<SyncableGroup>,
    /// Ids of groups adopted from remote
    pub added: Vec<String>,
}

/// Outcome of merging two payloads
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub payload: SyncPayload,
    pub conflicts: Vec<ConflictRecord>,
    /// Ids of profiles adopted from remote
    pub added_profiles: Vec<String>,
    /// Ids of groups adopted from remote
    pub added_groups: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Merger {
    sanitizer: Sanitizer,
}

impl Merger {
    pub fn new(mapper: PathMapper) -> Self {
        Self {
            sanitizer: Sanitizer::new(mapper),
        }
    }

    fn mapper(&self) -> &PathMapper {
        self.sanitizer.mapper()
    }

    /// Merge a remote profile onto a raw local one
    ///
    /// A field defined remotely replaces the local one unless `local_wins`
    /// and local defines it too. A blank local password is always filled
    /// from remote. Nothing outside the allow-lists is read from remote.
    pub fn merge_profile(
        &self,
        local_raw: &Value,
        remote: &SyncableProfile,
        local_wins: bool,
    ) -> Value {
        let mut merged = match local_raw {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        merged
            .entry("id".to_string())
            .or_insert_with(|| Value::String(remote.id.clone()));
        merged
            .entry("type".to_string())
            .or_insert_with(|| Value::String(remote.kind.clone()));

        let remote_fields = profile_fields(remote);
        for field in PROFILE_FIELDS {
            let Some(remote_value) = remote_fields.get(*field) else {
                continue;
            };
            if local_wins && is_defined(merged.get(*field)) {
                continue;
            }
            merged.insert((*field).to_string(), remote_value.clone());
        }

        let remote_options = restrict_options(&remote.options);
        let local_options = match merged.get("options") {
            Some(Value::Object(options)) => Some(options),
            _ => None,
        };
        let mut updates = Vec::new();
        for field in OPTION_FIELDS {
            let Some(remote_value) = remote_options.get(*field) else {
                continue;
            };
            if remote_value.is_null() {
                continue;
            }
            let local_value = local_options.and_then(|options| options.get(*field));
            let fill_password = *field == PASSWORD_OPTION && is_blank(local_value);
            if local_wins && is_defined(local_value) && !fill_password {
                continue;
            }
            let value = if *field == CWD_OPTION {
                self.mapper().to_local(remote_value)
            } else {
                remote_value.clone()
            };
            updates.push(((*field).to_string(), value));
        }

        if !updates.is_empty() {
            let options = merged
                .entry("options".to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !options.is_object() {
                *options = Value::Object(Map::new());
            }
            if let Value::Object(options) = options {
                options.extend(updates);
            }
        }

        Value::Object(merged)
    }

    /// Keep every local group and append remote groups with unseen ids
    pub fn merge_groups(&self, local: &[SyncableGroup], remote: &[SyncableGroup]) -> GroupMerge {
        let mut merged = local.to_vec();
        let mut seen: HashSet<String> = local.iter().map(|g| g.id.clone()).collect();
        let mut added = Vec::new();

        for group in remote {
            if seen.insert(group.id.clone()) {
                added.push(group.id.clone());
                merged.push(group.clone());
            }
        }

        GroupMerge { merged, added }
    }

    /// Deep-merge settings; remote leaves win, list sections are replaced
    ///
    /// Remote map sections are cut down to their allow-lists first.
    pub fn merge_settings(
        &self,
        local: &SyncableSettings,
        remote: &SyncableSettings,
    ) -> SyncableSettings {
        let remote = restrict_settings(remote);
        let mut merged = local.clone();

        for section in MAP_SECTIONS {
            let Some(remote_map) = remote.map_section(section.id) else {
                continue;
            };
            let section_map = match merged.map_section(section.id) {
                Some(local_map) => {
                    let mut base = Value::Object(local_map.clone());
                    deep_merge(&mut base, &Value::Object(remote_map.clone()));
                    match base {
                        Value::Object(map) => map,
                        _ => remote_map.clone(),
                    }
                }
                None => remote_map.clone(),
            };
            *merged.map_section_mut(section.id) = Some(section_map);
        }

        for section in LIST_SECTIONS {
            if let Some(items) = remote.list_section(section.id) {
                *merged.list_section_mut(section.id) = Some(items.clone());
            }
        }

        merged
    }

    /// Merge a remote payload into the local one
    ///
    /// `local_raw` supplies the raw profiles that serve as merge bases.
    pub fn merge_payloads(
        &self,
        local: &SyncPayload,
        remote: &SyncPayload,
        local_raw: &RawConfig,
    ) -> MergeResult {
        let resolution = ConflictResolver::resolve(local.last_updated, remote.last_updated);
        let local_wins = resolution == Resolution::Local;
        debug!(
            local_updated = local.last_updated,
            remote_updated = remote.last_updated,
            ?resolution,
            "Merging payloads"
        );

        let raw_profiles = raw_profiles_by_id(local_raw);
        let remote_profiles: HashMap<&str, SyncableProfile> = remote
            .profiles
            .iter()
            .map(|p| (p.id.as_str(), restrict_profile(p)))
            .collect();

        let mut profiles = Vec::with_capacity(local.profiles.len() + remote.profiles.len());
        let mut conflicts = Vec::new();
        for profile in &local.profiles {
            let Some(remote_profile) = remote_profiles.get(profile.id.as_str()) else {
                profiles.push(profile.clone());
                continue;
            };

            let base = match raw_profiles.get(profile.id.as_str()) {
                Some(raw) => (*raw).clone(),
                None => serde_json::to_value(profile).unwrap_or(Value::Null),
            };
            let merged_raw = self.merge_profile(&base, remote_profile, local_wins);
            let merged = self
                .sanitizer
                .sanitize_profile(&merged_raw)
                .unwrap_or_else(|| profile.clone());

            if profile != remote_profile {
                conflicts.push(ConflictRecord {
                    profile_id: profile.id.clone(),
                    profile_name: profile.display_name().to_string(),
                    resolution,
                });
            }
            profiles.push(merged);
        }

        let local_ids: HashSet<&str> = local.profiles.iter().map(|p| p.id.as_str()).collect();
        let mut added_profiles = Vec::new();
        for profile in &remote.profiles {
            if local_ids.contains(profile.id.as_str()) {
                continue;
            }
            if let Some(restricted) = remote_profiles.get(profile.id.as_str()) {
                if added_profiles.contains(&restricted.id) {
                    continue;
                }
                added_profiles.push(restricted.id.clone());
                profiles.push(restricted.clone());
            }
        }

        let groups = self.merge_groups(&local.groups, &remote.groups);

        let vault = match &local.vault {
            Some(vault) if vault.has_contents() => Some(vault.clone()),
            _ => remote.vault.clone().filter(|v| v.has_contents()),
        };

        let payload = SyncPayload {
            version: local.version.max(remote.version),
            last_updated: chrono::Utc::now().timestamp_millis(),
            source_host: local.source_host.clone(),
            profiles,
            groups: groups.merged,
            vault,
            settings: self.merge_settings(&local.settings, &remote.settings),
            installed_plugins: local.installed_plugins.clone(),
        };

        MergeResult {
            payload,
            conflicts,
            added_profiles,
            added_groups: groups.added,
        }
    }

    /// Write a merged payload back into the raw configuration
    ///
    /// Raw profiles and groups missing from `merged` are kept.
    pub fn apply_to_config(&self, raw: &RawConfig, merged: &SyncPayload) -> RawConfig {
        let mut out = match raw {
            Value::Object(map) => Value::Object(map.clone()),
            _ => Value::Object(Map::new()),
        };

        let profiles = self.apply_profiles(raw, &merged.profiles);
        let groups = apply_groups(raw, &merged.groups);

        if let Value::Object(root) = &mut out {
            if !profiles.is_empty() || root.contains_key("profiles") {
                root.insert("profiles".to_string(), Value::Array(profiles));
            }
            if !groups.is_empty() || root.contains_key("groups") {
                root.insert("groups".to_string(), Value::Array(groups));
            }
            if let Some(vault) = &merged.vault {
                if let Ok(vault) = serde_json::to_value(vault) {
                    root.insert("vault".to_string(), vault);
                }
            }
        }

        let settings = restrict_settings(&merged.settings);
        for section in MAP_SECTIONS {
            let Some(map) = settings.map_section(section.id) else {
                continue;
            };
            let mut overlay = map.clone();
            if section.id == MapSectionId::Terminal {
                if let Some(image) = overlay.get_mut(BACKGROUND_IMAGE_FIELD) {
                    *image = self.mapper().to_local(image);
                }
            }
            if let Some(slot) = slot_mut(&mut out, section.slot) {
                deep_merge(slot, &Value::Object(overlay));
            }
        }

        for section in LIST_SECTIONS {
            let Some(items) = settings.list_section(section.id) else {
                continue;
            };
            if let Some(slot) = slot_mut(&mut out, section.slot) {
                *slot = Value::Array(items.clone());
            }
        }

        out
    }

    fn apply_profiles(&self, raw: &RawConfig, merged: &[SyncableProfile]) -> Vec<Value> {
        let by_id: HashMap<&str, &SyncableProfile> =
            merged.iter().map(|p| (p.id.as_str(), p)).collect();

        let existing = match raw.get("profiles") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };

        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(existing.len() + merged.len());
        for item in existing {
            let id = item.as_object().and_then(|p| non_empty_str(p, "id"));
            match id.and_then(|id| by_id.get(id).map(|p| (id, p))) {
                Some((id, profile)) => {
                    seen.insert(id.to_string());
                    out.push(self.merge_profile(item, profile, false));
                }
                None => out.push(item.clone()),
            }
        }

        for profile in merged {
            if seen.insert(profile.id.clone()) {
                out.push(self.new_profile(profile));
            }
        }
        out
    }

    /// Raw form of a profile the local machine has never seen
    fn new_profile(&self, profile: &SyncableProfile) -> Value {
        let mut options = restrict_options(&profile.options);
        if let Some(cwd) = options.get_mut(CWD_OPTION) {
            *cwd = self.mapper().to_local(cwd);
        }
        let profile = SyncableProfile {
            options,
            ..profile.clone()
        };
        serde_json::to_value(&profile).unwrap_or(Value::Null)
    }
}

fn is_defined(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// Syncable top-level fields of a profile that are set
fn profile_fields(profile: &SyncableProfile) -> Map<String, Value> {
    match serde_json::to_value(profile) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn raw_profiles_by_id(raw: &RawConfig) -> HashMap<&str, &Value> {
    let Some(Value::Array(items)) = raw.get("profiles") else {
        return HashMap::new();
    };

    let mut by_id = HashMap::new();
    for item in items {
        if let Some(id) = item.as_object().and_then(|p| non_empty_str(p, "id")) {
            by_id.entry(id).or_insert(item);
        }
    }
    by_id
}

fn apply_groups(raw: &RawConfig, merged: &[SyncableGroup]) -> Vec<Value> {
    let mut out = match raw.get("groups") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    let mut known: HashSet<String> = out
        .iter()
        .filter_map(|g| g.as_object().and_then(|g| non_empty_str(g, "id")))
        .map(str::to_string)
        .collect();

    for group in merged {
        if known.insert(group.id.clone()) {
            if let Ok(value) = serde_json::to_value(group) {
                out.push(value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VaultBlob;
    use crate::pathmap::Platform;
    use crate::sanitize::FORBIDDEN_KEYS;
    use crate::tree::contains_key_deep;
    use serde_json::json;

    fn mapper() -> PathMapper {
        PathMapper::new("/home/alice", Platform::Unix)
    }

    fn merger() -> Merger {
        Merger::new(mapper())
    }

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(mapper())
    }

    fn local_raw() -> Value {
        json!({
            "language": "en",
            "profiles": [
                {
                    "id": "p1", "type": "ssh", "name": "prod",
                    "options": {
                        "host": "prod.example.com",
                        "user": "deploy",
                        "privateKeys": ["/home/alice/.ssh/id_ed25519"],
                        "cwd": "/home/alice/src"
                    }
                },
                { "id": "p2", "type": "local", "name": "shell" }
            ],
            "groups": [{ "id": "g1", "name": "Prod", "editable": true }],
            "terminal": {
                "fontSize": 14,
                "backgroundImage": "/home/alice/bg.png",
                "customColorSchemes": [{ "name": "Local" }]
            },
            "hotkeys": { "new-tab": ["Ctrl-T"] }
        })
    }

    fn payload_at(raw: &Value, host: &str, last_updated: i64) -> SyncPayload {
        let mut payload = sanitizer().create_payload(raw, host, &[]);
        payload.last_updated = last_updated;
        payload
    }

    fn remote_payload(profiles: Value, last_updated: i64) -> SyncPayload {
        serde_json::from_value(json!({
            "version": 1,
            "lastUpdated": last_updated,
            "sourceHost": "desktop",
            "profiles": profiles
        }))
        .unwrap()
    }

    #[test]
    fn merging_identical_payloads_is_idempotent() {
        let raw = local_raw();
        let local = payload_at(&raw, "laptop", 1000);

        let result = merger().merge_payloads(&local, &local, &raw);

        assert_eq!(result.payload.profiles, local.profiles);
        assert_eq!(result.payload.groups, local.groups);
        assert_eq!(result.payload.settings, local.settings);
        assert!(result.conflicts.is_empty());
        assert!(result.added_profiles.is_empty());
        assert!(result.added_groups.is_empty());

        let applied = merger().apply_to_config(&raw, &result.payload);
        assert_eq!(applied, raw);
    }

    #[test]
    fn disjoint_profiles_are_unioned() {
        let raw = local_raw();
        let local = payload_at(&raw, "laptop", 1000);
        let remote = remote_payload(
            json!([
                { "id": "p3", "type": "ssh", "name": "staging", "options": { "host": "stg" } },
                { "id": "p4", "type": "local", "name": "tmux" }
            ]),
            2000,
        );

        let result = merger().merge_payloads(&local, &remote, &raw);

        let ids: Vec<_> = result.payload.profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p4"]);
        assert_eq!(result.added_profiles, vec!["p3".to_string(), "p4".to_string()]);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn local_secrets_survive_merge_and_apply() {
        let raw = local_raw();
        let local = payload_at(&raw, "laptop", 1000);
        let remote = remote_payload(
            json!([{ "id": "p1", "type": "ssh", "name": "prod-renamed",
                     "options": { "host": "new.example.com" } }]),
            2000,
        );

        let result = merger().merge_payloads(&local, &remote, &raw);
        let applied = merger().apply_to_config(&raw, &result.payload);

        let p1 = &applied["profiles"][0];
        assert_eq!(p1["name"], json!("prod-renamed"));
        assert_eq!(p1["options"]["host"], json!("new.example.com"));
        assert_eq!(p1["options"]["privateKeys"], json!(["/home/alice/.ssh/id_ed25519"]));
    }

    #[test]
    fn remote_forbidden_keys_are_never_applied() {
        let raw = json!({ "profiles": [] });
        let local = payload_at(&raw, "laptop", 1000);
        let remote = remote_payload(
            json!([{ "id": "p9", "type": "ssh",
                     "options": { "host": "h", "proxyCommand": "evil",
                                  "algorithms": { "privateKey": "x" } } }]),
            2000,
        );

        let result = merger().merge_payloads(&local, &remote, &raw);
        let applied = merger().apply_to_config(&raw, &result.payload);

        assert!(!contains_key_deep(&applied, FORBIDDEN_KEYS));
        assert_eq!(applied["profiles"][0]["options"]["host"], json!("h"));
    }

    #[test]
    fn new_machine_bootstrap() {
        let raw = json!({});
        let local = payload_at(&raw, "fresh", 1000);
        let remote_source = local_raw();
        let mut remote = payload_at(&remote_source, "laptop", 500);
        remote.version = 3;

        let result = merger().merge_payloads(&local, &remote, &raw);
        let applied = Merger::new(PathMapper::new("/Users/bob", Platform::Unix))
            .apply_to_config(&raw, &result.payload);

        assert_eq!(applied["profiles"].as_array().unwrap().len(), 2);
        assert_eq!(applied["profiles"][0]["options"]["cwd"], json!("/Users/bob/src"));
        assert_eq!(applied["groups"][0]["id"], json!("g1"));
        assert_eq!(applied["terminal"]["fontSize"], json!(14));
        assert_eq!(applied["terminal"]["backgroundImage"], json!("/Users/bob/bg.png"));
        assert_eq!(applied["terminal"]["customColorSchemes"], json!([{ "name": "Local" }]));
        assert_eq!(applied["hotkeys"]["new-tab"], json!(["Ctrl-T"]));
        assert!(!contains_key_deep(&applied, FORBIDDEN_KEYS));
        assert_eq!(result.added_groups, vec!["g1".to_string()]);
        assert_eq!(result.added_profiles, vec!["p1".to_string(), "p2".to_string()]);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.payload.version, 3);
    }

    #[test]
    fn newer_side_wins_conflicting_fields() {
        let raw = local_raw();
        let remote_profiles =
            json!([{ "id": "p1", "type": "ssh", "name": "remote-name", "options": { "host": "r" } }]);

        let local = payload_at(&raw, "laptop", 2000);
        let remote = remote_payload(remote_profiles.clone(), 1000);
        let result = merger().merge_payloads(&local, &remote, &raw);
        assert_eq!(result.payload.profile("p1").unwrap().name.as_deref(), Some("prod"));
        assert_eq!(result.conflicts[0].resolution, Resolution::Local);
        assert_eq!(result.conflicts[0].profile_name, "prod");

        let local = payload_at(&raw, "laptop", 1000);
        let remote = remote_payload(remote_profiles, 2000);
        let result = merger().merge_payloads(&local, &remote, &raw);
        let p1 = result.payload.profile("p1").unwrap();
        assert_eq!(p1.name.as_deref(), Some("remote-name"));
        assert_eq!(p1.options["host"], json!("r"));
        assert_eq!(p1.options["user"], json!("deploy"));
        assert_eq!(result.conflicts[0].resolution, Resolution::Remote);
    }

    #[test]
    fn blank_local_password_is_filled_even_when_local_wins() {
        let local_raw = json!({ "id": "p1", "type": "ssh", "options": { "host": "h", "password": "" } });
        let remote: SyncableProfile = serde_json::from_value(json!({
            "id": "p1", "type": "ssh", "options": { "host": "other", "password": "s3cret" }
        }))
        .unwrap();

        let merged = merger().merge_profile(&local_raw, &remote, true);

        assert_eq!(merged["options"]["password"], json!("s3cret"));
        assert_eq!(merged["options"]["host"], json!("h"));
    }

    #[test]
    fn set_local_password_is_kept_when_local_wins() {
        let local_raw = json!({ "id": "p1", "type": "ssh", "options": { "password": "mine" } });
        let remote: SyncableProfile = serde_json::from_value(json!({
            "id": "p1", "type": "ssh", "options": { "password": "theirs" }
        }))
        .unwrap();

        let merged = merger().merge_profile(&local_raw, &remote, true);
        assert_eq!(merged["options"]["password"], json!("mine"));
    }

    #[test]
    fn local_vault_takes_precedence() {
        let raw = local_raw();
        let vault = |contents: &str| VaultBlob {
            iv: Some("iv".to_string()),
            key_salt: Some("salt".to_string()),
            contents: Some(contents.to_string()),
            version: Some(json!(1)),
            extra: Map::new(),
        };

        let mut local = payload_at(&raw, "laptop", 1000);
        let mut remote = remote_payload(json!([]), 2000);
        remote.vault = Some(vault("remote"));

        local.vault = Some(vault("local"));
        let result = merger().merge_payloads(&local, &remote, &raw);
        assert_eq!(result.payload.vault.unwrap().contents.as_deref(), Some("local"));

        local.vault = Some(vault(""));
        let result = merger().merge_payloads(&local, &remote, &raw);
        assert_eq!(result.payload.vault.unwrap().contents.as_deref(), Some("remote"));

        local.vault = None;
        let result = merger().merge_payloads(&local, &remote, &raw);
        let applied = merger().apply_to_config(&raw, &result.payload);
        assert_eq!(applied["vault"]["contents"], json!("remote"));
    }

    #[test]
    fn settings_merge_remote_leaves_win() {
        let local: SyncableSettings = serde_json::from_value(json!({
            "terminal": { "fontSize": 12, "font": "Mono" },
            "colorSchemes": [{ "name": "A" }, { "name": "B" }]
        }))
        .unwrap();
        let remote: SyncableSettings = serde_json::from_value(json!({
            "terminal": { "fontSize": 16 },
            "hotkeys": { "copy": ["Ctrl-C"] },
            "colorSchemes": [{ "name": "C" }]
        }))
        .unwrap();

        let merged = merger().merge_settings(&local, &remote);

        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({
                "terminal": { "fontSize": 16, "font": "Mono" },
                "hotkeys": { "copy": ["Ctrl-C"] },
                "colorSchemes": [{ "name": "C" }]
            })
        );
    }

    #[test]
    fn remote_settings_outside_allow_lists_are_ignored() {
        let raw = local_raw();
        let local = payload_at(&raw, "laptop", 1000);
        let remote: SyncPayload = serde_json::from_value(json!({
            "version": 1,
            "lastUpdated": 2000,
            "sourceHost": "desktop",
            "profiles": [],
            "settings": {
                "application": { "language": "de", "profiles": [] },
                "sshAgent": { "agentType": "pageant", "agentPath": "/tmp/agent" }
            }
        }))
        .unwrap();

        let result = merger().merge_payloads(&local, &remote, &raw);
        let application = result.payload.settings.application.as_ref().unwrap();
        assert!(!application.contains_key("profiles"));
        assert!(!result.payload.settings.ssh_agent.as_ref().unwrap().contains_key("agentPath"));

        // Replacing local with remote verbatim goes through the same filter
        for merged in [&result.payload, &remote] {
            let applied = merger().apply_to_config(&raw, merged);
            assert_eq!(
                applied["profiles"][0]["options"]["privateKeys"],
                json!(["/home/alice/.ssh/id_ed25519"])
            );
            assert_eq!(applied["profiles"].as_array().unwrap().len(), 2);
            assert_eq!(applied["language"], json!("de"));
            assert_eq!(applied["ssh"], json!({ "agentType": "pageant" }));
        }
    }

    #[test]
    fn apply_does_not_add_empty_lists() {
        let raw = json!({ "profiles": [{ "id": "p2", "type": "local", "name": "shell" }] });
        let payload = payload_at(&raw, "laptop", 1000);
        let result = merger().merge_payloads(&payload, &payload, &raw);

        assert_eq!(merger().apply_to_config(&raw, &result.payload), raw);

        let empty = json!({});
        let applied = merger().apply_to_config(&empty, &remote_payload(json!([]), 1000));
        assert_eq!(applied, empty);
    }

    #[test]
    fn merged_version_is_the_higher_one() {
        let raw = local_raw();
        let mut local = payload_at(&raw, "laptop", 1000);
        local.version = 4;
        let remote = remote_payload(json!([]), 2000);

        assert_eq!(merger().merge_payloads(&local, &remote, &raw).payload.version, 4);
        assert_eq!(merger().merge_payloads(&remote, &local, &raw).payload.version, 4);
    }

    #[test]
    fn raw_profiles_missing_from_payload_are_kept() {
        let raw = json!({ "profiles": [{ "id": "keep", "type": "local" }, { "note": "no id" }] });
        let merged = remote_payload(json!([{ "id": "new", "type": "ssh" }]), 1000);

        let applied = merger().apply_to_config(&raw, &merged);

        let profiles = applied["profiles"].as_array().unwrap();
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0]["id"], json!("keep"));
        assert_eq!(profiles[1]["note"], json!("no id"));
        assert_eq!(profiles[2]["id"], json!("new"));
    }
}
