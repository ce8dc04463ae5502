//! Dotted-path access over YAML config trees.
//!
//! Keys are dotted paths (`gflownet.optimizer.lr`). A numeric segment indexes
//! into a sequence (`logger.tags.0`). The empty key addresses the root.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Human-readable kind of a node, used in type mismatch errors.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// Join a parent path and a child segment.
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

/// Render a mapping key as a path segment.
pub fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{:?}", other),
    }
}

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|s| !s.is_empty())
}

/// Look up the node at `key`.
pub fn get<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(key) {
        current = match current {
            Value::Mapping(map) => map.get(segment)?,
            Value::Sequence(seq) => seq.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable lookup of the node at `key`.
pub fn get_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments(key) {
        current = match current {
            Value::Mapping(map) => map.get_mut(segment)?,
            Value::Sequence(seq) => seq.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn contains(root: &Value, key: &str) -> bool {
    get(root, key).is_some()
}

/// Set `value` at `key`, creating intermediate mappings as needed.
///
/// A non-mapping node on the way is replaced by a mapping.
pub fn set(root: &mut Value, key: &str, value: Value) {
    let parts: Vec<&str> = segments(key).collect();
    let Some((last, parents)) = parts.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = match current {
            Value::Mapping(map) => map,
            _ => unreachable!("converted to mapping above"),
        };
        current = map
            .entry(Value::String(segment.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    if !current.is_mapping() {
        *current = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = current {
        map.insert(Value::String(last.to_string()), value);
    }
}

/// Remove and return the node at `key`.
pub fn remove(root: &mut Value, key: &str) -> Option<Value> {
    let (parent, last) = match key.rsplit_once('.') {
        Some((parent, last)) => (parent, last),
        None => ("", key),
    };
    match get_mut(root, parent)? {
        Value::Mapping(map) => map.remove(last),
        Value::Sequence(seq) => {
            let index = last.parse::<usize>().ok()?;
            (index < seq.len()).then(|| seq.remove(index))
        }
        _ => None,
    }
}

/// Wrap `body` so that it sits at the dotted `package` path.
pub fn nest(package: &str, body: Value) -> Value {
    let mut parts: Vec<&str> = segments(package).collect();
    let mut wrapped = body;
    while let Some(segment) = parts.pop() {
        let mut map = Mapping::new();
        map.insert(Value::String(segment.to_string()), wrapped);
        wrapped = Value::Mapping(map);
    }
    wrapped
}

/// Flatten nested mappings into `parent<sep>child` keys.
///
/// Sequences and scalars are leaves. An empty mapping disappears.
pub fn flatten(value: &Value, sep: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, "", sep, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, sep: &str, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let key = key_string(k);
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{}{}{}", prefix, sep, key)
                };
                flatten_into(v, &full, sep, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}

/// Render a scalar for display or string interpolation.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
