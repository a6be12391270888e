//! Hierarchical JSON document tree.
//!
//! Documents form one tree of JSON objects. A write replaces the node at a
//! path wholesale. Empty values are never stored: writing `null`, `{}` or
//! `[]` removes the node, and objects left empty by a removal are pruned up
//! to the root.

use serde_json::{Map, Value};

use crate::paths::DocPath;

/// Strip nulls and empty containers. Returns `None` when nothing is left.
#[must_use]
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        Value::Array(items) if items.is_empty() => None,
        other => Some(other),
    }
}

/// Value at `path`, cloned.
#[must_use]
pub fn get(root: &Map<String, Value>, path: &DocPath) -> Option<Value> {
    let mut segments = path.segments();
    let first = segments.next()?;
    let mut node = root.get(first)?;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    Some(node.clone())
}

/// Replace the node at `path` with `value`. A scalar found on the way down
/// is replaced by an object.
pub fn set(root: &mut Map<String, Value>, path: &DocPath, value: Value) {
    let segments: Vec<&str> = path.segments().collect();
    match normalize(value) {
        Some(value) => insert(root, &segments, value),
        None => {
            remove(root, &segments);
        }
    }
}

fn insert(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*head).to_string(), value);
        return;
    }
    let child = map
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child) = child {
        insert(child, rest, value);
    }
}

/// Remove the node at `segments`. Returns whether `map` is now empty.
fn remove(map: &mut Map<String, Value>, segments: &[&str]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return map.is_empty();
    };
    if rest.is_empty() {
        map.remove(*head);
    } else if let Some(Value::Object(child)) = map.get_mut(*head) {
        if remove(child, rest) {
            map.remove(*head);
        }
    }
    map.is_empty()
}
