//! Configuration Composition
//!
//! Builds the experiment configuration from a primary config, the group
//! options named by its defaults list, `override` entries found in selected
//! options, and command-line overrides. The merged tree is then interpolated.
//! Composition runs once at start-up and the result is never mutated.

use crate::error::ComposeError;
use chrono::{Local, NaiveDateTime};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

pub mod defaults;
pub mod interpolate;
pub mod merge;
pub mod node;
pub mod overrides;
pub mod repository;

pub use defaults::{DefaultEntry, GroupDefault};
pub use merge::{merge, MergeMode};
pub use overrides::{Override, OverrideKind};
pub use repository::{ConfigFile, ConfigRepository, Package};

/// Passes allowed for `override` entries to settle.
const MAX_OVERRIDE_PASSES: usize = 32;
/// Nesting allowed for defaults lists.
const MAX_DEPTH: usize = 16;

/// Result of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedConfig {
    /// Merged tree before interpolation.
    pub raw: Value,
    /// Merged tree with every interpolation substituted.
    pub resolved: Value,
    /// Selected option per group.
    pub choices: BTreeMap<String, String>,
    /// Command-line overrides, in the order given.
    pub overrides: Vec<String>,
    /// Timestamp used by `${now:...}`.
    pub composed_at: NaiveDateTime,
}

impl ComposedConfig {
    /// Resolved value at a dotted key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        node::get(&self.resolved, key)
    }

    pub fn to_yaml(&self, resolved: bool) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(if resolved { &self.resolved } else { &self.raw })
    }

    /// Resolved leaves keyed by `parent<sep>child`.
    pub fn flatten(&self, sep: &str) -> BTreeMap<String, Value> {
        node::flatten(&self.resolved, sep)
    }
}

/// One body in the merge sequence.
#[derive(Debug)]
struct Layer {
    source: String,
    package: String,
    body: Value,
    mode: MergeMode,
}

pub struct Composer {
    repo: ConfigRepository,
    config_name: String,
    timestamp: Option<NaiveDateTime>,
}

impl Composer {
    pub fn new(repo: ConfigRepository, config_name: impl Into<String>) -> Self {
        Self {
            repo,
            config_name: config_name.into(),
            timestamp: None,
        }
    }

    /// Pin the timestamp used by `${now:...}`. Without it the local time at
    /// composition is used.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn repository(&self) -> &ConfigRepository {
        &self.repo
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Compose the primary config with command-line `overrides`.
    pub fn compose<S: AsRef<str>>(&self, overrides: &[S]) -> Result<ComposedConfig, ComposeError> {
        let parsed = overrides
            .iter()
            .map(|o| Override::parse(o.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let (group_overrides, value_overrides): (Vec<_>, Vec<_>) = parsed
            .into_iter()
            .partition(|o| self.repo.is_group(o.group_name()));

        let primary = self.repo.load_primary(&self.config_name)?;
        let mut top = primary.defaults.clone();
        if !top.contains(&DefaultEntry::SelfRef) {
            top.push(DefaultEntry::SelfRef);
        }

        let mut pinned = HashSet::new();
        for o in &group_overrides {
            apply_group_override(&mut top, o)?;
            pinned.insert(o.group_name().to_string());
        }
        self.settle_overrides(&mut top, &pinned)?;

        let mut layers = Vec::new();
        let mut choices = BTreeMap::new();
        let primary_package = primary
            .package
            .as_ref()
            .map(|p| p.resolve(None))
            .unwrap_or_default();
        self.expand_list(
            &primary,
            &top,
            None,
            &primary_package,
            MergeMode::Define,
            &mut layers,
            &mut choices,
            &mut vec![primary.name.clone()],
        )?;

        let mut raw = Value::Mapping(Mapping::new());
        for layer in &layers {
            debug!(source = %layer.source, package = %layer.package, mode = ?layer.mode, "Merging layer");
            let wrapped = node::nest(&layer.package, layer.body.clone());
            merge::merge(&mut raw, &wrapped, layer.mode)?;
        }

        for o in &value_overrides {
            debug!(override_ = %o, "Applying override");
            o.apply(&mut raw)?;
        }

        let composed_at = self
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());
        let resolved = interpolate::resolve(&raw, composed_at)?;

        info!(
            config = %self.config_name,
            layers = layers.len(),
            overrides = overrides.len(),
            "Composed config"
        );

        Ok(ComposedConfig {
            raw,
            resolved,
            choices,
            overrides: overrides.iter().map(|o| o.as_ref().trim().to_string()).collect(),
            composed_at,
        })
    }

    /// Apply `override` entries of the selected options to the top-level list
    /// until the choices stop changing.
    fn settle_overrides(
        &self,
        top: &mut [DefaultEntry],
        pinned: &HashSet<String>,
    ) -> Result<(), ComposeError> {
        for pass in 0..MAX_OVERRIDE_PASSES {
            let mut found = Vec::new();
            for entry in top.iter() {
                if let DefaultEntry::Group(g) = entry {
                    if let Some(option) = &g.option {
                        self.collect_overrides(&g.group, option, g.optional, &mut found, 0)?;
                    }
                }
            }

            let mut changed = false;
            for (group, option) in found {
                if pinned.contains(&group) {
                    continue;
                }
                let target = find_group_mut(top, &group)
                    .ok_or_else(|| ComposeError::NoMatchInDefaults(group.clone()))?;
                if target.option != option {
                    debug!(group = %group, option = ?option, pass, "Defaults override");
                    target.option = option;
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
        Err(ComposeError::DefaultsCycle(MAX_OVERRIDE_PASSES))
    }

    fn collect_overrides(
        &self,
        group: &str,
        option: &str,
        optional: bool,
        found: &mut Vec<(String, Option<String>)>,
        depth: usize,
    ) -> Result<(), ComposeError> {
        if depth > MAX_DEPTH {
            return Err(ComposeError::InvalidDefaults {
                file: format!("{}/{}", group, option),
                reason: "defaults nest too deeply".to_string(),
            });
        }
        let Some(file) = self.load_option(group, option, optional)? else {
            return Ok(());
        };
        for entry in &file.defaults {
            if let DefaultEntry::Group(g) = entry {
                let resolved = g.resolve_group(Some(group));
                if g.is_override {
                    found.push((resolved, g.option.clone()));
                } else if let Some(nested) = &g.option {
                    self.collect_overrides(&resolved, nested, g.optional, found, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn load_option(
        &self,
        group: &str,
        option: &str,
        optional: bool,
    ) -> Result<Option<ConfigFile>, ComposeError> {
        match self.repo.load_option(group, option)? {
            Some(file) => Ok(Some(file)),
            None if optional => {
                debug!(group, option, "Skipping missing optional default");
                Ok(None)
            }
            None => Err(ComposeError::OptionNotFound {
                group: group.to_string(),
                option: option.to_string(),
                available: self.repo.options(group),
            }),
        }
    }

    /// Expand a defaults list into merge layers, in order.
    #[allow(clippy::too_many_arguments)]
    fn expand_list(
        &self,
        file: &ConfigFile,
        entries: &[DefaultEntry],
        group: Option<&str>,
        package: &str,
        mode: MergeMode,
        layers: &mut Vec<Layer>,
        choices: &mut BTreeMap<String, String>,
        stack: &mut Vec<String>,
    ) -> Result<(), ComposeError> {
        if stack.len() > MAX_DEPTH {
            return Err(ComposeError::InvalidDefaults {
                file: file.name.clone(),
                reason: "defaults nest too deeply".to_string(),
            });
        }

        for entry in entries {
            match entry {
                DefaultEntry::SelfRef => layers.push(Layer {
                    source: file.name.clone(),
                    package: package.to_string(),
                    body: file.body.clone(),
                    mode,
                }),
                DefaultEntry::Config(path) => {
                    let path = match (group, path.strip_prefix('/')) {
                        (_, Some(absolute)) => absolute.to_string(),
                        (Some(g), None) if !g.is_empty() => format!("{}/{}", g, path),
                        _ => path.clone(),
                    };
                    if stack.contains(&path) {
                        return Err(ComposeError::InvalidDefaults {
                            file: file.name.clone(),
                            reason: format!("recursive include of '{}'", path),
                        });
                    }
                    let included = self.repo.load(&path)?.ok_or_else(|| {
                        ComposeError::ConfigNotFound(self.repo.root().join(format!("{}.yaml", path)))
                    })?;
                    stack.push(path);
                    let nested = with_implicit_self(&included.defaults);
                    self.expand_list(
                        &included, &nested, group, package, mode, layers, choices, stack,
                    )?;
                    stack.pop();
                }
                DefaultEntry::Group(g) if g.is_override => {}
                DefaultEntry::Group(g) => {
                    let resolved_group = g.resolve_group(group);
                    let Some(option) = &g.option else {
                        continue;
                    };
                    let Some(option_file) = self.load_option(&resolved_group, option, g.optional)?
                    else {
                        continue;
                    };
                    choices.insert(resolved_group.clone(), option.clone());

                    let option_package = g
                        .package
                        .as_deref()
                        .map(Package::parse)
                        .or_else(|| option_file.package.clone())
                        .unwrap_or(Package::Group)
                        .resolve(Some(&resolved_group));
                    let option_mode = if option_package.is_empty() {
                        MergeMode::Patch
                    } else {
                        MergeMode::Define
                    };

                    stack.push(option_file.name.clone());
                    let nested = with_implicit_self(&option_file.defaults);
                    self.expand_list(
                        &option_file,
                        &nested,
                        Some(&resolved_group),
                        &option_package,
                        option_mode,
                        layers,
                        choices,
                        stack,
                    )?;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

fn with_implicit_self(entries: &[DefaultEntry]) -> Vec<DefaultEntry> {
    let mut entries = entries.to_vec();
    if !entries.contains(&DefaultEntry::SelfRef) {
        entries.push(DefaultEntry::SelfRef);
    }
    entries
}

fn find_group_mut<'a>(top: &'a mut [DefaultEntry], group: &str) -> Option<&'a mut GroupDefault> {
    top.iter_mut().find_map(|entry| match entry {
        DefaultEntry::Group(g) if !g.is_override && g.group == group => Some(g),
        _ => None,
    })
}

fn apply_group_override(top: &mut Vec<DefaultEntry>, o: &Override) -> Result<(), ComposeError> {
    let group = o.group_name().to_string();
    let option = o.option_name()?;
    match o.kind {
        OverrideKind::Assign => {
            let target = find_group_mut(top, &group)
                .ok_or_else(|| ComposeError::NoMatchInDefaults(group.clone()))?;
            target.option = option;
            if let Some(package) = o.package() {
                target.package = Some(package.to_string());
            }
        }
        OverrideKind::Add => {
            if find_group_mut(top, &group).is_some() {
                return Err(ComposeError::GroupAlreadyPresent(group));
            }
            top.push(new_group_entry(group, option, o.package()));
        }
        OverrideKind::ForceAdd => match find_group_mut(top, &group) {
            Some(target) => target.option = option,
            None => top.push(new_group_entry(group, option, o.package())),
        },
        OverrideKind::Delete => {
            let index = top
                .iter()
                .position(|e| matches!(e, DefaultEntry::Group(g) if !g.is_override && g.group == group))
                .ok_or_else(|| ComposeError::NoMatchInDefaults(group.clone()))?;
            if let (Some(expected), DefaultEntry::Group(g)) = (&option, &top[index]) {
                if g.option.as_ref() != Some(expected) {
                    return Err(ComposeError::ValueMismatch {
                        key: group,
                        expected: expected.clone(),
                        actual: g.option.clone().unwrap_or_else(|| "null".to_string()),
                    });
                }
            }
            top.remove(index);
        }
    }
    Ok(())
}

fn new_group_entry(group: String, option: Option<String>, package: Option<&str>) -> DefaultEntry {
    DefaultEntry::Group(GroupDefault {
        group,
        absolute: true,
        option,
        package: package.map(str::to_string),
        optional: false,
        is_override: false,
    })
}
