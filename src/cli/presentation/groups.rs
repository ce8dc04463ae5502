//! Groups presentation: config groups, their options and the default choice.

use crate::error::ApiError;
use comfy_table::Table;
use serde::Serialize;

/// One config group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub group: String,
    pub options: Vec<String>,
    /// Option chosen by the primary config's defaults list, if any.
    pub selected: Option<String>,
}

pub fn format_groups_text(rows: &[GroupRow]) -> String {
    if rows.is_empty() {
        return "No config groups found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Group", "Options", "Default"]);
    for row in rows {
        table.add_row(vec![
            row.group.clone(),
            row.options.join(", "),
            row.selected.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn format_groups_json(rows: &[GroupRow]) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(&serde_json::json!({ "groups": rows }))?)
}
