//! Command-line override grammar.
//!
//! ```text
//! key=value     modify an existing key (or select a group option)
//! +key=value    add a key that is not in the config (or append a group)
//! ++key=value   add or modify
//! ~key[=value]  delete a key (or drop a group)
//! ```

use super::merge::{merge_at, MergeMode};
use super::node;
use crate::error::ComposeError;
use serde_yaml::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    Assign,
    Add,
    ForceAdd,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub kind: OverrideKind,
    pub key: String,
    pub value: Option<Value>,
    raw: String,
}

impl Override {
    pub fn parse(raw: &str) -> Result<Self, ComposeError> {
        let invalid = |reason: &str| ComposeError::InvalidOverride(raw.to_string(), reason.to_string());
        let trimmed = raw.trim();

        let (kind, rest) = if let Some(rest) = trimmed.strip_prefix('~') {
            (OverrideKind::Delete, rest)
        } else if let Some(rest) = trimmed.strip_prefix("++") {
            (OverrideKind::ForceAdd, rest)
        } else if let Some(rest) = trimmed.strip_prefix('+') {
            (OverrideKind::Add, rest)
        } else {
            (OverrideKind::Assign, trimmed)
        };

        let (key, value) = match rest.split_once('=') {
            Some((key, value)) => (key.trim(), Some(parse_value(value))),
            None if kind == OverrideKind::Delete => (rest.trim(), None),
            None => return Err(invalid("expected key=value")),
        };

        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if let Some(bad) = key
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '@')))
        {
            return Err(invalid(&format!("unexpected character '{}' in key", bad)));
        }
        if key.starts_with('.') || key.ends_with('.') || key.contains("..") {
            return Err(invalid("malformed dotted key"));
        }

        Ok(Self {
            kind,
            key: key.to_string(),
            value,
            raw: trimmed.to_string(),
        })
    }

    /// Group name addressed by this override, with any `@package` suffix removed.
    pub fn group_name(&self) -> &str {
        let key = self.key.trim_start_matches('/');
        key.split_once('@').map(|(g, _)| g).unwrap_or(key)
    }

    /// Package suffix (`group@pkg=...`), if any.
    pub fn package(&self) -> Option<&str> {
        self.key.split_once('@').map(|(_, p)| p)
    }

    /// The override value as a group option name. `null` disables the group.
    pub fn option_name(&self) -> Result<Option<String>, ComposeError> {
        match &self.value {
            None | Some(Value::Null) => Ok(None),
            Some(value) => node::scalar_to_string(value).map(Some).ok_or_else(|| {
                ComposeError::InvalidOverride(
                    self.raw.clone(),
                    "group options must be scalar names".to_string(),
                )
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Apply this override to a composed tree.
    pub fn apply(&self, tree: &mut Value) -> Result<(), ComposeError> {
        match self.kind {
            OverrideKind::Assign => {
                let value = self.value.as_ref().unwrap_or(&Value::Null);
                let existing = node::get_mut(tree, &self.key)
                    .ok_or_else(|| ComposeError::UnknownKey(self.key.clone()))?;
                merge_at(existing, value, MergeMode::Patch, &self.key)
            }
            OverrideKind::Add => {
                if node::contains(tree, &self.key) {
                    return Err(ComposeError::KeyExists(self.key.clone()));
                }
                node::set(tree, &self.key, self.value.clone().unwrap_or(Value::Null));
                Ok(())
            }
            OverrideKind::ForceAdd => {
                node::set(tree, &self.key, self.value.clone().unwrap_or(Value::Null));
                Ok(())
            }
            OverrideKind::Delete => {
                let existing = node::get(tree, &self.key)
                    .ok_or_else(|| ComposeError::UnknownKey(self.key.clone()))?;
                if let Some(expected) = &self.value {
                    if existing != expected {
                        return Err(ComposeError::ValueMismatch {
                            key: self.key.clone(),
                            expected: render(expected),
                            actual: render(existing),
                        });
                    }
                }
                node::remove(tree, &self.key);
                Ok(())
            }
        }
    }
}

impl FromStr for Override {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Override::parse(s)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse the right-hand side of an override as a YAML flow value.
///
/// Anything YAML cannot parse stays a plain string.
pub fn parse_value(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::String(_)) | Err(_) => Value::String(text.to_string()),
        Ok(value) => value,
    }
}

fn render(value: &Value) -> String {
    node::scalar_to_string(value).unwrap_or_else(|| {
        serde_yaml::to_string(value)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{:?}", value))
    })
}
