//! Compose presentation: composed trees, validation summaries, prepared runs.

use super::shared::format_section_heading;
use crate::compose::{node, ComposedConfig};
use crate::error::ApiError;
use crate::run::RunDirectory;
use crate::schema::ExperimentConfig;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_yaml::Value;

/// Render a composed tree as yaml, json or flat `key: value` lines.
pub fn format_composed(
    composed: &ComposedConfig,
    format: &str,
    unresolved: bool,
) -> Result<String, ApiError> {
    let tree = if unresolved {
        &composed.raw
    } else {
        &composed.resolved
    };
    match format {
        "yaml" => Ok(serde_yaml::to_string(tree)?),
        "json" => Ok(serde_json::to_string_pretty(tree)?),
        "flat" => Ok(format_flat(tree, "_")),
        other => Err(ApiError::ConfigError(format!(
            "Invalid format: {} (must be 'yaml', 'json' or 'flat')",
            other
        ))),
    }
}

/// One `key: value` line per leaf, keys joined with `sep`.
pub fn format_flat(tree: &Value, sep: &str) -> String {
    node::flatten(tree, sep)
        .into_iter()
        .map(|(key, value)| format!("{}: {}", key, inline_value(&value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_value(value: &Value) -> String {
    node::scalar_to_string(value).unwrap_or_else(|| {
        serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
    })
}

pub fn format_validation_summary(composed: &ComposedConfig, config: &ExperimentConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Config is valid")));

    if !composed.choices.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Group", "Choice"]);
        for (group, option) in &composed.choices {
            table.add_row(vec![group.clone(), option.clone()]);
        }
        out.push_str(&format!("{}\n\n", table));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Key", "Value"]);
    let rows = [
        ("env.n_dim", config.env.n_dim.to_string()),
        ("env.length_traj", config.env.length_traj.to_string()),
        ("env.reward_func", config.env.reward_func.to_string()),
        (
            "gflownet.optimizer.batch_size",
            config.gflownet.optimizer.batch_size.to_string(),
        ),
        (
            "gflownet.optimizer.n_train_steps",
            config.gflownet.optimizer.n_train_steps.to_string(),
        ),
        ("logger.project_name", config.logger.project_name.clone()),
        ("hydra.run.dir", config.hydra.run.dir.clone()),
    ];
    for (key, value) in rows {
        table.add_row(vec![key.to_string(), value]);
    }
    out.push_str(&format!("{}", table));
    out
}

pub fn format_prepare_result(run: &RunDirectory) -> String {
    format!(
        "Prepared run directory: {}\n  Fingerprint: {}",
        run.path.display(),
        run.fingerprint
    )
}
