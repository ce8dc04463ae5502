//! Workspace settings files: .torusflow/config.toml and .torusflow/{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Directory holding workspace settings.
pub const WORKSPACE_DIR: &str = ".torusflow";

/// Add workspace settings files to the builder.
/// Precedence: .torusflow/config.toml (base) then .torusflow/{TORUSFLOW_ENV}.toml.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let settings_dir = workspace_root.join(WORKSPACE_DIR);
    let env_name = std::env::var("TORUSFLOW_ENV").unwrap_or_else(|_| "development".to_string());

    let mut builder = builder;

    let base_path = settings_dir.join("config.toml");
    if base_path.exists() {
        builder = builder.add_source(File::from(base_path).format(FileFormat::Toml).required(false));
    }

    let env_path = settings_dir.join(format!("{}.toml", env_name));
    if env_path.exists() {
        builder = builder.add_source(File::from(env_path).format(FileFormat::Toml).required(false));
    }

    Ok(builder)
}
