//! Merge rules: built-in defaults applied before any file or env source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("compose.config_root", "config")?
        .set_default("compose.config_name", "config")?
        .set_default("run.overwrite", false)?
        .set_default("logging.level", "off")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
