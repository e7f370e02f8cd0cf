//! Projection of the raw configuration onto the syncable schema.
//!
//! Nothing leaves the machine except what passes through here: profiles
//! are stripped of secret-bearing keys and cut down to an allow-list,
//! settings are copied section by section, and paths under the home
//! directory are rewritten into portable form.

pub mod profile;
pub mod settings;

use crate::models::{
    RawConfig, SyncPayload, SyncableGroup, SyncableProfile, SyncableSettings, VaultBlob,
    PAYLOAD_VERSION,
};
use crate::pathmap::PathMapper;
use crate::tree::{copy_fields, non_empty_str};
use serde_json::Value;
use settings::{
    read_slot, Fields, MapSectionId, BACKGROUND_IMAGE_FIELD, LIST_SECTIONS, MAP_SECTIONS,
};
use std::collections::HashSet;
use tracing::warn;

pub use profile::{restrict_profile, FORBIDDEN_KEYS, OPTION_FIELDS, PROFILE_FIELDS};

/// Builds sync payloads from raw configuration
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    mapper: PathMapper,
}

impl Sanitizer {
    pub fn new(mapper: PathMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Project one raw profile; `None` if it lacks `id` or `type`
    pub fn sanitize_profile(&self, profile: &Value) -> Option<SyncableProfile> {
        profile::sanitize_profile(profile, &self.mapper)
    }

    /// Project the settings sections of a raw configuration
    ///
    /// Never fails: missing or mistyped sections are simply absent.
    pub fn sanitize_settings(&self, raw: &RawConfig) -> SyncableSettings {
        let mut settings = SyncableSettings::default();

        for section in MAP_SECTIONS {
            let Some(Value::Object(source)) = read_slot(raw, section.slot) else {
                continue;
            };
            let mut projected = match section.fields {
                Fields::Only(fields) => copy_fields(source, fields),
                Fields::All => source.clone(),
            };
            if projected.is_empty() {
                continue;
            }
            if section.id == MapSectionId::Terminal {
                if let Some(image) = projected.get_mut(BACKGROUND_IMAGE_FIELD) {
                    *image = self.mapper.to_portable(image);
                }
            }
            *settings.map_section_mut(section.id) = Some(projected);
        }

        for section in LIST_SECTIONS {
            if let Some(Value::Array(items)) = read_slot(raw, section.slot) {
                *settings.list_section_mut(section.id) = Some(items.clone());
            }
        }

        settings
    }

    /// Project the group list
    pub fn sanitize_groups(&self, raw: &RawConfig) -> Vec<SyncableGroup> {
        let Some(Value::Array(groups)) = raw.get("groups") else {
            return Vec::new();
        };

        groups
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|group| {
                let id = non_empty_str(group, "id")?;
                Some(SyncableGroup {
                    id: id.to_string(),
                    name: group
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    collapsed: group.get("collapsed").and_then(Value::as_bool),
                })
            })
            .collect()
    }

    /// The host vault, if it carries encrypted contents
    pub fn sanitize_vault(&self, raw: &RawConfig) -> Option<VaultBlob> {
        let vault = raw.get("vault")?;
        serde_json::from_value::<VaultBlob>(vault.clone())
            .ok()
            .filter(VaultBlob::has_contents)
    }

    /// Project every raw profile, dropping unusable and duplicate entries
    pub fn sanitize_profiles(&self, raw: &RawConfig) -> Vec<SyncableProfile> {
        let Some(Value::Array(profiles)) = raw.get("profiles") else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        profiles
            .iter()
            .filter_map(|p| self.sanitize_profile(p))
            .filter(|p| {
                let fresh = seen.insert(p.id.clone());
                if !fresh {
                    warn!(profile_id = %p.id, "Skipping profile with duplicate id");
                }
                fresh
            })
            .collect()
    }

    /// Assemble the payload for the current machine
    pub fn create_payload(
        &self,
        raw: &RawConfig,
        hostname: &str,
        installed_plugins: &[String],
    ) -> SyncPayload {
        SyncPayload {
            version: PAYLOAD_VERSION,
            last_updated: chrono::Utc::now().timestamp_millis(),
            source_host: hostname.to_string(),
            profiles: self.sanitize_profiles(raw),
            groups: self.sanitize_groups(raw),
            vault: self.sanitize_vault(raw),
            settings: self.sanitize_settings(raw),
            installed_plugins: installed_plugins.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathmap::Platform;
    use crate::tree::contains_key_deep;
    use serde_json::json;

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(PathMapper::new("/home/alice", Platform::Unix))
    }

    fn raw_config() -> Value {
        json!({
            "version": 7,
            "language": "de",
            "enableAnalytics": false,
            "profiles": [
                { "id": "p1", "type": "ssh", "name": "prod",
                  "options": { "host": "h1", "privateKeys": ["/home/alice/.ssh/id"] } },
                { "name": "no id", "type": "ssh" },
                { "id": "p1", "type": "ssh", "name": "dup" },
                { "id": "p2", "type": "local", "name": "shell",
                  "options": { "cwd": "/home/alice/work", "command": "zsh" } }
            ],
            "groups": [
                { "id": "g1", "name": "Prod", "collapsed": true, "editable": true },
                { "name": "no id" }
            ],
            "vault": { "version": 1, "contents": "", "keySalt": "s", "iv": "i" },
            "terminal": {
                "fontSize": 14,
                "backgroundImage": "/home/alice/Pictures/bg.png",
                "customColorSchemes": [{ "name": "Mine" }],
                "unknownKnob": 1
            },
            "appearance": { "theme": "Standard", "opacity": 0.9, "dock": "off" },
            "hotkeys": { "new-tab": ["Ctrl-Shift-T"] },
            "ssh": { "agentType": "auto", "agentPath": "/usr/bin/ssh-agent", "winSCPPath": "C:\\w.exe" },
            "pluginBlacklist": ["tabby-telemetry"],
            "qc": { "cmds": [{ "name": "ls", "text": "ls -la" }] }
        })
    }

    #[test]
    fn payload_profiles_are_filtered_and_deduplicated() {
        let payload = sanitizer().create_payload(&raw_config(), "laptop", &[]);

        let ids: Vec<_> = payload.profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(payload.profiles[0].name.as_deref(), Some("prod"));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn payload_never_contains_forbidden_keys() {
        let payload = sanitizer().create_payload(&raw_config(), "laptop", &[]);
        let value = serde_json::to_value(&payload).unwrap();

        assert!(!contains_key_deep(&value, FORBIDDEN_KEYS));
        assert!(!contains_key_deep(&value, &["agentPath", "winSCPPath", "command"]));
    }

    #[test]
    fn payload_stamps_version_host_and_time() {
        let before = chrono::Utc::now().timestamp_millis();
        let payload =
            sanitizer().create_payload(&raw_config(), "laptop", &["tabby-docker".to_string()]);

        assert_eq!(payload.version, 1);
        assert_eq!(payload.source_host, "laptop");
        assert!(payload.last_updated >= before);
        assert_eq!(payload.installed_plugins, vec!["tabby-docker".to_string()]);
    }

    #[test]
    fn groups_are_projected() {
        let groups = sanitizer().sanitize_groups(&raw_config());

        assert_eq!(
            groups,
            vec![SyncableGroup {
                id: "g1".to_string(),
                name: "Prod".to_string(),
                collapsed: Some(true),
            }]
        );
    }

    #[test]
    fn empty_vault_is_absent() {
        assert!(sanitizer().sanitize_vault(&raw_config()).is_none());

        let mut raw = raw_config();
        raw["vault"]["contents"] = json!("ciphertext");
        let vault = sanitizer().sanitize_vault(&raw).unwrap();
        assert_eq!(vault.contents.as_deref(), Some("ciphertext"));
    }

    #[test]
    fn settings_sections_are_projected() {
        let settings = sanitizer().sanitize_settings(&raw_config());

        let terminal = settings.terminal.unwrap();
        assert_eq!(terminal["fontSize"], json!(14));
        assert_eq!(terminal["backgroundImage"], json!("$SYNC_HOME/Pictures/bg.png"));
        assert!(terminal.get("unknownKnob").is_none());
        assert!(terminal.get("customColorSchemes").is_none());

        let appearance = settings.appearance.unwrap();
        assert_eq!(appearance["theme"], json!("Standard"));
        assert!(appearance.get("opacity").is_none());
        let window = settings.window.unwrap();
        assert_eq!(window["opacity"], json!(0.9));
        assert_eq!(window["dock"], json!("off"));

        assert_eq!(settings.hotkeys.unwrap()["new-tab"], json!(["Ctrl-Shift-T"]));
        let agent = settings.ssh_agent.unwrap();
        assert_eq!(agent["agentType"], json!("auto"));
        assert!(agent.get("agentPath").is_none());

        let app = settings.application.unwrap();
        assert_eq!(app["language"], json!("de"));
        assert!(app.get("version").is_none());

        assert_eq!(settings.color_schemes.unwrap(), vec![json!({ "name": "Mine" })]);
        assert_eq!(settings.plugin_blacklist.unwrap(), vec![json!("tabby-telemetry")]);
        assert_eq!(settings.quick_commands.unwrap().len(), 1);
    }

    #[test]
    fn settings_on_empty_config_are_empty() {
        let settings = sanitizer().sanitize_settings(&json!({}));
        assert_eq!(settings, SyncableSettings::default());

        let settings = sanitizer().sanitize_settings(&json!("not even a map"));
        assert_eq!(settings, SyncableSettings::default());
    }
}
