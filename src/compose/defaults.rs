//! Defaults list entries.
//!
//! ```yaml
//! defaults:
//!   - _self_
//!   - env: ctorus                  # select option `ctorus` of group `env`
//!   - experiments: null            # group known but disabled
//!   - optional user: local         # skipped if user/local.yaml is missing
//!   - logger@log: wandb            # place the option under `log`
//!   - override /env: ctorus        # change the option chosen elsewhere
//!   - shared/paths                 # include a plain config file
//! ```

use crate::error::ComposeError;
use serde_yaml::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultEntry {
    /// Position of the containing file's own body.
    SelfRef,
    /// A plain config included at the containing file's package.
    Config(String),
    Group(GroupDefault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefault {
    /// Group path as written, without a leading `/`.
    pub group: String,
    /// `true` when written with a leading `/`.
    pub absolute: bool,
    /// Selected option, `None` when disabled.
    pub option: Option<String>,
    pub package: Option<String>,
    pub optional: bool,
    pub is_override: bool,
}

impl GroupDefault {
    /// Group path relative to the config root.
    ///
    /// Relative groups in a nested defaults list live under the containing
    /// config's group.
    pub fn resolve_group(&self, parent_group: Option<&str>) -> String {
        match parent_group {
            Some(parent) if !self.absolute && !parent.is_empty() => {
                format!("{}/{}", parent, self.group)
            }
            _ => self.group.clone(),
        }
    }
}

/// Parse the `defaults` sequence of a config file.
pub fn parse_defaults(file: &str, value: &Value) -> Result<Vec<DefaultEntry>, ComposeError> {
    let invalid = |reason: String| ComposeError::InvalidDefaults {
        file: file.to_string(),
        reason,
    };

    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(entries) => entries,
        other => {
            return Err(invalid(format!(
                "defaults must be a list, found {}",
                super::node::kind(other)
            )))
        }
    };

    let mut parsed = Vec::with_capacity(entries.len());
    let mut seen_self = false;
    for entry in entries {
        match entry {
            Value::String(s) if s == "_self_" => {
                if seen_self {
                    return Err(invalid("_self_ listed twice".to_string()));
                }
                seen_self = true;
                parsed.push(DefaultEntry::SelfRef);
            }
            Value::String(s) => parsed.push(DefaultEntry::Config(s.trim().to_string())),
            Value::Mapping(map) if map.len() == 1 => {
                let Some((key, option)) = map.iter().next() else {
                    continue;
                };
                let key = key
                    .as_str()
                    .ok_or_else(|| invalid("group names must be strings".to_string()))?;
                parsed.push(DefaultEntry::Group(parse_group_entry(key, option).map_err(invalid)?));
            }
            Value::Mapping(_) => {
                return Err(invalid(
                    "each defaults entry must have exactly one key".to_string(),
                ))
            }
            other => {
                return Err(invalid(format!(
                    "unsupported defaults entry of type {}",
                    super::node::kind(other)
                )))
            }
        }
    }

    if let Some(dup) = duplicate_group(&parsed) {
        return Err(invalid(format!("group '{}' listed more than once", dup)));
    }
    Ok(parsed)
}

fn parse_group_entry(key: &str, option: &Value) -> Result<GroupDefault, String> {
    let mut words: Vec<&str> = key.split_whitespace().collect();
    let spec = words
        .pop()
        .ok_or_else(|| "empty group name".to_string())?;

    let mut optional = false;
    let mut is_override = false;
    for word in words {
        match word {
            "optional" => optional = true,
            "override" => is_override = true,
            other => return Err(format!("unknown keyword '{}' in '{}'", other, key)),
        }
    }

    let absolute = spec.starts_with('/');
    let spec = spec.trim_start_matches('/');
    let (group, package) = match spec.split_once('@') {
        Some((group, package)) => (group, Some(package.to_string())),
        None => (spec, None),
    };
    if group.is_empty() {
        return Err(format!("empty group name in '{}'", key));
    }

    let option = match option {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(_) => {
            return Err(format!("group '{}' selects several options; pick one", group))
        }
        other => {
            return Err(format!(
                "option of group '{}' must be a name, found {}",
                group,
                super::node::kind(other)
            ))
        }
    };

    Ok(GroupDefault {
        group: group.to_string(),
        absolute,
        option,
        package,
        optional,
        is_override,
    })
}

fn duplicate_group(entries: &[DefaultEntry]) -> Option<&str> {
    let mut seen = std::collections::HashSet::new();
    entries.iter().find_map(|entry| match entry {
        DefaultEntry::Group(g) if !g.is_override && !seen.insert(g.group.as_str()) => {
            Some(g.group.as_str())
        }
        _ => None,
    })
}
