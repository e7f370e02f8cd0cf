//! Connection profile projection.
//!
//! Two independent filters guard what leaves the machine: a deny-list of
//! secret-bearing keys stripped at every depth, then an allow-list that
//! decides which of the surviving fields are copied at all.

use crate::models::SyncableProfile;
use crate::pathmap::PathMapper;
use crate::tree::{copy_fields, non_empty_str, remove_keys_deep};
use serde_json::{Map, Value};

/// Keys that never leave the machine, at any nesting depth
pub const FORBIDDEN_KEYS: &[&str] = &[
    "privateKey",
    "privateKeys",
    "privateKeyPath",
    "privateKeyPaths",
    "keyPath",
    "keyPaths",
    "proxyCommand",
    "preConnectScript",
    "postConnectScript",
];

/// Syncable top-level profile fields besides `id` and `type`
pub const PROFILE_FIELDS: &[&str] = &[
    "name",
    "group",
    "icon",
    "color",
    "weight",
    "disableDynamicTitle",
    "behaviorOnSessionEnd",
];

/// Syncable connection options
pub const OPTION_FIELDS: &[&str] = &[
    "host",
    "port",
    "user",
    "auth",
    "password",
    "algorithms",
    "keepaliveInterval",
    "keepaliveCountMax",
    "readyTimeout",
    "x11",
    "agentForward",
    "jumpHost",
    "cwd",
];

/// Option holding a working directory, stored in portable form
pub const CWD_OPTION: &str = "cwd";

/// Project a raw profile onto the syncable schema
///
/// Returns `None` when the profile has no usable `id` or `type`.
pub fn sanitize_profile(profile: &Value, mapper: &PathMapper) -> Option<SyncableProfile> {
    let mut copy = profile.clone();
    remove_keys_deep(&mut copy, FORBIDDEN_KEYS);

    let map = match copy {
        Value::Object(map) => map,
        _ => return None,
    };

    let id = non_empty_str(&map, "id")?.to_string();
    let kind = non_empty_str(&map, "type")?.to_string();

    let mut options = match map.get("options") {
        Some(Value::Object(raw_options)) => copy_fields(raw_options, OPTION_FIELDS),
        _ => Map::new(),
    };
    if let Some(cwd) = options.get_mut(CWD_OPTION) {
        *cwd = mapper.to_portable(cwd);
    }

    Some(SyncableProfile {
        id,
        kind,
        name: string_field(&map, "name"),
        group: string_field(&map, "group"),
        icon: string_field(&map, "icon"),
        color: string_field(&map, "color"),
        weight: match map.get("weight") {
            Some(Value::Number(n)) => Some(n.clone()),
            _ => None,
        },
        disable_dynamic_title: map.get("disableDynamicTitle").and_then(Value::as_bool),
        behavior_on_session_end: string_field(&map, "behaviorOnSessionEnd"),
        options,
    })
}

/// Re-apply both filters to options that arrived from elsewhere
pub fn restrict_options(options: &Map<String, Value>) -> Map<String, Value> {
    let mut restricted = Value::Object(copy_fields(options, OPTION_FIELDS));
    remove_keys_deep(&mut restricted, FORBIDDEN_KEYS);
    match restricted {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Re-apply both filters to a profile that arrived from elsewhere
pub fn restrict_profile(profile: &SyncableProfile) -> SyncableProfile {
    SyncableProfile {
        options: restrict_options(&profile.options),
        ..profile.clone()
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}
