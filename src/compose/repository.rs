//! Config repository: a directory of YAML files organized in groups.
//!
//! `<root>/<name>.yaml` is a config, `<root>/<group>/<option>.yaml` is an option
//! of `group`. Groups are directories and may nest.

use super::defaults::{parse_defaults, DefaultEntry};
use crate::error::ComposeError;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Target package of a config body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    Global,
    Group,
    Path(String),
}

impl Package {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "_global_" | "" => Package::Global,
            "_group_" => Package::Group,
            other => Package::Path(other.to_string()),
        }
    }

    /// Dotted path for this package; the empty string is the root.
    pub fn resolve(&self, group: Option<&str>) -> String {
        match self {
            Package::Global => String::new(),
            Package::Group => group.unwrap_or_default().replace('/', "."),
            Package::Path(path) => path.clone(),
        }
    }
}

/// A parsed config file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Path relative to the repository root, without extension.
    pub name: String,
    /// Package declared with `# @package`, if any.
    pub package: Option<Package>,
    pub defaults: Vec<DefaultEntry>,
    /// File content with the `defaults` key removed.
    pub body: Value,
}

/// Parse config text. An empty document is an empty mapping.
pub fn parse_config_file(name: &str, text: &str) -> Result<ConfigFile, ComposeError> {
    let parse_err = |message: String| ComposeError::Parse {
        file: name.to_string(),
        message,
    };

    let package = package_header(text).map(|p| Package::parse(&p));
    let value: Value = serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))?;
    let mut body = match value {
        Value::Null => Mapping::new(),
        Value::Mapping(map) => map,
        other => {
            return Err(parse_err(format!(
                "top level must be a mapping, found {}",
                super::node::kind(&other)
            )))
        }
    };

    let defaults = match body.remove("defaults") {
        Some(value) => parse_defaults(name, &value)?,
        None => Vec::new(),
    };

    Ok(ConfigFile {
        name: name.to_string(),
        package,
        defaults,
        body: Value::Mapping(body),
    })
}

/// `# @package <pkg>` in the leading comment block.
fn package_header(text: &str) -> Option<String> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let comment = line.strip_prefix('#')?;
        if let Some(package) = comment.trim().strip_prefix("@package") {
            return Some(package.trim().to_string());
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct ConfigRepository {
    root: PathBuf,
}

impl ConfigRepository {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ComposeError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ComposeError::ConfigNotFound(root.to_path_buf()));
        }
        let root = dunce::canonicalize(root)?;
        debug!(root = %root.display(), "Opened config repository");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if `group` is a directory under the root.
    pub fn is_group(&self, group: &str) -> bool {
        let group = group.trim_matches('/');
        !group.is_empty() && !group.contains("..") && self.root.join(group).is_dir()
    }

    /// Options of `group`, sorted.
    pub fn options(&self, group: &str) -> Vec<String> {
        let dir = self.root.join(group.trim_matches('/'));
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut options: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_config_extension(p))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        options.sort();
        options.dedup();
        options
    }

    /// All groups (directories holding at least one config), sorted.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(&self.root).ok()?;
                let group = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                (!self.options(&group).is_empty()).then_some(group)
            })
            .collect();
        groups.sort();
        groups
    }

    /// Load `<root>/<path>.yaml`.
    pub fn load(&self, path: &str) -> Result<Option<ConfigFile>, ComposeError> {
        let Some(file) = self.find_file(path) else {
            return Ok(None);
        };
        debug!(config = path, file = %file.display(), "Loading config");
        let text = std::fs::read_to_string(&file)?;
        parse_config_file(path.trim_matches('/'), &text).map(Some)
    }

    /// Load the primary config, failing if it does not exist.
    pub fn load_primary(&self, name: &str) -> Result<ConfigFile, ComposeError> {
        self.load(name)?
            .ok_or_else(|| ComposeError::ConfigNotFound(self.root.join(format!("{}.yaml", name))))
    }

    /// Load an option of a group. `None` if the option file is missing.
    pub fn load_option(&self, group: &str, option: &str) -> Result<Option<ConfigFile>, ComposeError> {
        self.load(&format!("{}/{}", group.trim_matches('/'), option))
    }

    fn find_file(&self, path: &str) -> Option<PathBuf> {
        let rel = path.trim_matches('/');
        if rel.is_empty() || rel.split('/').any(|part| part == "..") {
            return None;
        }
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", rel, ext)))
            .find(|p| p.is_file())
    }
}

fn has_config_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e))
        .unwrap_or(false)
}
