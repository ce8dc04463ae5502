//! Merge rules: definitions add keys, patches may only modify existing ones.

use super::interpolate::has_interpolation;
use super::node::{join, key_string, kind};
use crate::error::ComposeError;
use serde_yaml::Value;

/// How an incoming body is merged into the accumulated tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Additive deep merge. Later wins at leaves, mappings merge recursively.
    Define,
    /// Strict deep merge. Every key must already exist and keep its type.
    Patch,
}

/// Deep-merge `incoming` into `base`.
pub fn merge(base: &mut Value, incoming: &Value, mode: MergeMode) -> Result<(), ComposeError> {
    merge_at(base, incoming, mode, "")
}

pub(crate) fn merge_at(
    base: &mut Value,
    incoming: &Value,
    mode: MergeMode,
    path: &str,
) -> Result<(), ComposeError> {
    match (base, incoming) {
        (Value::Mapping(base_map), Value::Mapping(incoming_map)) => {
            for (key, incoming_value) in incoming_map {
                let child = join(path, &key_string(key));
                match base_map.get_mut(key) {
                    Some(existing) => merge_at(existing, incoming_value, mode, &child)?,
                    None if mode == MergeMode::Patch => {
                        return Err(ComposeError::UnknownKey(child));
                    }
                    None => {
                        base_map.insert(key.clone(), incoming_value.clone());
                    }
                }
            }
            Ok(())
        }
        (base, incoming) => {
            if mode == MergeMode::Patch {
                check_compatible(base, incoming, path)?;
            }
            *base = incoming.clone();
            Ok(())
        }
    }
}

/// Check that `incoming` may replace `existing` at `key`.
///
/// Null is compatible with everything, and so is any string carrying an
/// interpolation since its type is only known after resolution. Integers
/// widen to floats, never the other way round.
pub fn check_compatible(existing: &Value, incoming: &Value, key: &str) -> Result<(), ComposeError> {
    let compatible = match (existing, incoming) {
        (Value::Null, _) | (_, Value::Null) => true,
        (Value::String(s), _) if has_interpolation(s) => true,
        (_, Value::String(s)) if has_interpolation(s) => true,
        (Value::Bool(_), Value::Bool(_)) => true,
        (Value::Number(a), Value::Number(b)) => a.is_f64() || !b.is_f64(),
        (Value::String(_), Value::String(_)) => true,
        (Value::Sequence(_), Value::Sequence(_)) => true,
        (Value::Mapping(_), Value::Mapping(_)) => true,
        (Value::Tagged(_), Value::Tagged(_)) => true,
        _ => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(ComposeError::TypeMismatch {
            key: key.to_string(),
            expected: kind(existing),
            found: kind(incoming),
        })
    }
}
