//! Helpers over the loosely-typed configuration tree.
//!
//! The host configuration is an arbitrary nest of maps, sequences and
//! scalars, held as [`serde_json::Value`]. Every routine here matches all
//! variants explicitly.

use serde_json::{Map, Value};

/// Remove every key in `keys` from `value`, at every depth
///
/// Descends through both objects and arrays.
pub fn remove_keys_deep(value: &mut Value, keys: &[&str]) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !keys.contains(&key.as_str()));
            for child in map.values_mut() {
                remove_keys_deep(child, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_keys_deep(item, keys);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

/// Check whether any key in `keys` occurs anywhere inside `value`
pub fn contains_key_deep(value: &Value, keys: &[&str]) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, child)| keys.contains(&key.as_str()) || contains_key_deep(child, keys)),
        Value::Array(items) => items.iter().any(|item| contains_key_deep(item, keys)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}

/// Deep-merge `overlay` onto `base`; overlay wins at the leaves
///
/// Objects merge key by key. Any other overlay value, arrays included,
/// replaces what is in `base`.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_child) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_child) => deep_merge(base_child, overlay_child),
                    None => {
                        base_map.insert(key.clone(), overlay_child.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Copy the listed fields that are present in `source`
///
/// Absent fields are omitted rather than written as null.
pub fn copy_fields(source: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            source
                .get(*field)
                .map(|value| ((*field).to_string(), value.clone()))
        })
        .collect()
}

/// True when a value is absent, null or an empty string
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_)) => false,
    }
}

/// Non-empty string at `key`, if any
pub fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remove_keys_deep() {
        let mut value = json!({
            "privateKey": "x",
            "options": {
                "privateKey": "y",
                "nested": [{ "privateKey": "z", "keep": 1 }]
            }
        });

        remove_keys_deep(&mut value, &["privateKey"]);

        assert_eq!(
            value,
            json!({ "options": { "nested": [{ "keep": 1 }] } })
        );
        assert!(!contains_key_deep(&value, &["privateKey"]));
    }

    #[test]
    fn test_deep_merge_overlay_wins() {
        let mut base = json!({
            "a": { "x": 1, "y": 2 },
            "list": [1, 2, 3],
            "keep": true
        });
        let overlay = json!({
            "a": { "y": 20, "z": 30 },
            "list": [9]
        });

        deep_merge(&mut base, &overlay);

        assert_eq!(
            base,
            json!({
                "a": { "x": 1, "y": 20, "z": 30 },
                "list": [9],
                "keep": true
            })
        );
    }

    #[test]
    fn test_deep_merge_replaces_mismatched_types() {
        let mut base = json!({ "a": "scalar" });
        deep_merge(&mut base, &json!({ "a": { "b": 1 } }));
        assert_eq!(base, json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn test_copy_fields_omits_absent() {
        let source = json!({ "a": 1, "b": null, "c": 3 });
        let copied = copy_fields(source.as_object().unwrap(), &["a", "b", "missing"]);

        assert_eq!(Value::Object(copied), json!({ "a": 1, "b": null }));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&json!(null))));
        assert!(is_blank(Some(&json!(""))));
        assert!(!is_blank(Some(&json!("pw"))));
        assert!(!is_blank(Some(&json!(0))));
    }
}
