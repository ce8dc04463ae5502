//! Tool Settings
//!
//! Settings for the `torusflow` tool itself (where the config tree lives, run
//! defaults, logging), layered with the `config` crate. Experiment configs are
//! composed separately by [`crate::compose`].
//!
//! Precedence, lowest to highest: built-in defaults, global file, workspace
//! files, `TORUSFLOW__SECTION__KEY` environment variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

mod merge_policy;
mod sources;

pub use sources::global_file::global_config_path;
pub use sources::workspace_file::WORKSPACE_DIR;

/// Root settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub compose: ComposeSettings,

    #[serde(default)]
    pub run: RunSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the experiment config tree lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeSettings {
    /// Config tree root, relative to the workspace root unless absolute
    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,

    /// Primary config name (without extension)
    #[serde(default = "default_config_name")]
    pub config_name: String,
}

fn default_config_root() -> PathBuf {
    PathBuf::from("config")
}

fn default_config_name() -> String {
    "config".to_string()
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            config_root: default_config_root(),
            config_name: default_config_name(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Reuse existing run directories
    #[serde(default)]
    pub overwrite: bool,
}

impl Settings {
    /// Config tree root resolved against `workspace_root`.
    pub fn config_root(&self, workspace_root: &Path) -> PathBuf {
        if self.compose.config_root.is_absolute() {
            self.compose.config_root.clone()
        } else {
            workspace_root.join(&self.compose.config_root)
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.compose.config_name.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "compose.config_name cannot be empty".to_string(),
            ));
        }
        if self.compose.config_root.as_os_str().is_empty() {
            return Err(ApiError::ConfigError(
                "compose.config_root cannot be empty".to_string(),
            ));
        }
        crate::logging::validate_format(&self.logging.format)
    }

    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self).map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

/// Loads [`Settings`] from the layered sources.
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings for a workspace: defaults, global file, workspace files, env.
    pub fn load(workspace_root: &Path) -> Result<Settings, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        Self::finish(builder)
    }

    /// Load settings from one explicit file on top of the defaults; env still applies.
    pub fn load_from_file(path: &Path) -> Result<Settings, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).format(FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ApiError> {
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("TORUSFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        debug!(
            config_root = %settings.compose.config_root.display(),
            config_name = %settings.compose.config_name,
            "Loaded settings"
        );
        Ok(settings)
    }
}
