//! Sync data models: the syncable projection and the payload wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashSet;

/// The host's whole configuration tree
pub type RawConfig = Value;

/// Current payload format version
pub const PAYLOAD_VERSION: u32 = 1;

/// A connection profile restricted to fields that are safe to leave the machine.
///
/// `options` only ever carries keys from the options allow-list; see
/// [`crate::sanitize::profile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableProfile {
    /// Stable identity across machines; preserved verbatim
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_dynamic_title: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_on_session_end: Option<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl SyncableProfile {
    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A profile group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncableGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

/// The host's own encrypted secret vault, handled as one opaque unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBlob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Whatever else the host keeps in the vault block
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VaultBlob {
    /// A vault only counts once it carries encrypted contents
    pub fn has_contents(&self) -> bool {
        self.contents.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Restricted projections of the host's UI and application settings
///
/// Every section is independently optional and absent sections are not
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkeys: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_agent: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_schemes: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_blacklist: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_commands: Option<Vec<Value>>,
}

/// The unit exchanged with the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub version: u32,
    /// Epoch milliseconds; the only conflict-resolution signal
    pub last_updated: i64,
    #[serde(default)]
    pub source_host: String,
    pub profiles: Vec<SyncableProfile>,
    #[serde(default)]
    pub groups: Vec<SyncableGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault: Option<VaultBlob>,
    #[serde(default)]
    pub settings: SyncableSettings,
    /// Informational only
    #[serde(default)]
    pub installed_plugins: Vec<String>,
}

impl SyncPayload {
    /// Check invariants that serde cannot express
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.version == 0 {
            return Err("payload version must be at least 1".to_string());
        }
        if self.last_updated <= 0 {
            return Err("payload has no lastUpdated timestamp".to_string());
        }

        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if profile.id.is_empty() {
                return Err("profile without id".to_string());
            }
            if !seen.insert(profile.id.as_str()) {
                return Err(format!("duplicate profile id {}", profile.id));
            }
        }
        Ok(())
    }

    /// Profile with the given id
    pub fn profile(&self, id: &str) -> Option<&SyncableProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }
}
