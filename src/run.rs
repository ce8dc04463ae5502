//! Run directory preparation.
//!
//! Resolves `hydra.run.dir`, creates the directory and persists the composed
//! configuration under `<run_dir>/.hydra/`.

use crate::compose::{node, ComposedConfig};
use crate::error::{ApiError, ComposeError};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata directory inside a run directory.
pub const HYDRA_DIR: &str = ".hydra";

/// Key excluded from the fingerprint.
const RUNTIME_KEY: &str = "hydra";

/// A prepared run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    pub path: PathBuf,
    pub fingerprint: String,
}

impl RunDirectory {
    pub fn metadata_dir(&self) -> PathBuf {
        self.path.join(HYDRA_DIR)
    }
}

/// Contents of `.hydra/meta.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMeta {
    pub fingerprint: String,
    pub composed_at: String,
    pub choices: BTreeMap<String, String>,
}

/// Content hash of the resolved config, ignoring the `hydra` section.
///
/// Keys are sorted before hashing so the result does not depend on file
/// order.
pub fn fingerprint(resolved: &Value) -> Result<String, ApiError> {
    let mut tree = resolved.clone();
    if let Value::Mapping(map) = &mut tree {
        map.remove(RUNTIME_KEY);
    }
    let canonical = serde_json::to_vec(&canonical_json(&tree)?)?;
    Ok(hex::encode(blake3::hash(&canonical).as_bytes()))
}

fn canonical_json(value: &Value) -> Result<serde_json::Value, ApiError> {
    Ok(match value {
        Value::Mapping(map) => {
            let mut entries = map
                .iter()
                .map(|(k, v)| Ok((node::key_string(k), canonical_json(v)?)))
                .collect::<Result<Vec<_>, ApiError>>()?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            serde_json::Value::Object(entries.into_iter().collect())
        }
        Value::Sequence(seq) => serde_json::Value::Array(
            seq.iter().map(canonical_json).collect::<Result<_, _>>()?,
        ),
        Value::Tagged(tagged) => canonical_json(&tagged.value)?,
        other => serde_json::to_value(other)?,
    })
}

/// Prepare the run directory, resolving a relative `hydra.run.dir` against
/// the current directory.
pub fn prepare_run_dir(composed: &ComposedConfig, overwrite: bool) -> Result<RunDirectory, ApiError> {
    prepare_run_dir_in(Path::new("."), composed, overwrite)
}

/// Prepare the run directory, resolving a relative `hydra.run.dir` against
/// `base`.
pub fn prepare_run_dir_in(
    base: &Path,
    composed: &ComposedConfig,
    overwrite: bool,
) -> Result<RunDirectory, ApiError> {
    let dir = run_dir(composed)?;
    let path = if dir.is_absolute() { dir } else { base.join(dir) };

    if path.exists() && !overwrite {
        return Err(ApiError::RunDirExists(path));
    }

    let metadata_dir = path.join(HYDRA_DIR);
    fs::create_dir_all(&metadata_dir)?;
    debug!(path = %path.display(), "Created run directory");

    let fingerprint = fingerprint(&composed.resolved)?;
    fs::write(metadata_dir.join("config.yaml"), composed.to_yaml(true)?)?;
    fs::write(
        metadata_dir.join("overrides.yaml"),
        serde_yaml::to_string(&composed.overrides)?,
    )?;
    let meta = RunMeta {
        fingerprint: fingerprint.clone(),
        composed_at: composed.composed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        choices: composed.choices.clone(),
    };
    fs::write(metadata_dir.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;

    info!(path = %path.display(), fingerprint = %fingerprint, "Prepared run directory");
    Ok(RunDirectory { path, fingerprint })
}

/// `hydra.run.dir` from the resolved tree.
pub fn run_dir(composed: &ComposedConfig) -> Result<PathBuf, ApiError> {
    let key = "hydra.run.dir";
    match composed.get(key) {
        Some(Value::String(dir)) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        Some(other) => Err(ComposeError::TypeMismatch {
            key: key.to_string(),
            expected: "string",
            found: node::kind(other),
        }
        .into()),
        None => Err(ComposeError::UnknownKey(key.to_string()).into()),
    }
}

/// Read back the metadata of a prepared run.
pub fn read_meta(run: &Path) -> Result<RunMeta, ApiError> {
    let text = fs::read_to_string(run.join(HYDRA_DIR).join("meta.json"))?;
    Ok(serde_json::from_str(&text)?)
}
