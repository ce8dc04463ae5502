//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{command_name, override_count};
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_composed, format_flat, format_groups_json, format_groups_text, format_prepare_result,
    format_rollouts_json, format_rollouts_text, format_section_heading, format_validation_summary,
    GroupRow, RolloutRow,
};
pub use route::RunContext;
