//! Rollout presentation: one row per sampled trajectory.

use super::shared::format_section_heading;
use crate::error::ApiError;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RolloutRow {
    pub index: usize,
    /// Terminal state in readable form.
    pub terminal: String,
    /// Terminal angles in radians.
    pub angles: Vec<f64>,
    pub n_actions: usize,
    pub logprob: f64,
}

pub fn format_rollouts_text(rows: &[RolloutRow], policy: &str, seed: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Rollouts ({} policy, seed {})", policy, seed))
    ));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Terminal state (degrees)", "Actions", "Log-prob"]);
    for row in rows {
        table.add_row(vec![
            row.index.to_string(),
            row.terminal.clone(),
            row.n_actions.to_string(),
            format!("{:.4}", row.logprob),
        ]);
    }
    out.push_str(&format!("{}", table));
    out
}

pub fn format_rollouts_json(rows: &[RolloutRow], policy: &str, seed: u64) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "policy": policy,
        "seed": seed,
        "trajectories": rows,
    }))?)
}
