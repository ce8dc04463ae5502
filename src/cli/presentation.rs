//! CLI presentation: text and json formatters per command family.

mod compose;
mod groups;
mod rollout;
mod shared;

pub use compose::{format_composed, format_flat, format_prepare_result, format_validation_summary};
pub use groups::{format_groups_json, format_groups_text, GroupRow};
pub use rollout::{format_rollouts_json, format_rollouts_text, RolloutRow};
pub use shared::format_section_heading;
