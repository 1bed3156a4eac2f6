//! JSON tree operations shared by the in-memory store and the stream client.
//!
//! The backend treats `null` and empty objects as absent: writing `null`
//! deletes a node and any parent left empty is pruned.

use serde_json::{Map, Value};

/// Split a path into keys. The root (`""` or `"/"`) has no keys.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when one path is equal to or nested under the other.
pub fn paths_overlap(a: &[String], b: &[String]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// Read the value at `segments`, `Null` when absent.
pub fn get(root: &Value, segments: &[String]) -> Value {
    let mut node = root;
    for key in segments {
        match node.get(key) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    node.clone()
}

/// Replace the value at `segments`.
pub fn set(root: &mut Value, segments: &[String], value: Value) {
    set_in(root, segments, normalize(value));
}

/// Merge each key of `partial` below `segments`. Keys may themselves be
/// slash-separated paths.
pub fn merge(root: &mut Value, segments: &[String], partial: Map<String, Value>) {
    for (key, value) in partial {
        let mut target = segments.to_vec();
        target.extend(split_path(&key));
        set(root, &target, value);
    }
}

fn set_in(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if value.is_null() {
        if let Value::Object(map) = node {
            if let Some(child) = map.get_mut(head) {
                set_in(child, rest, Value::Null);
                if child.is_null() {
                    map.remove(head);
                }
            }
            if map.is_empty() {
                *node = Value::Null;
            }
        }
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_in(child, rest, value);
    }
}

/// Drop null members and collapse empty objects to `Null`.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}
