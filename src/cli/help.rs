//! CLI help: command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name string for log records (e.g. "compose", "rollout").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Compose { .. } => "compose",
        Commands::Validate { .. } => "validate",
        Commands::Prepare { .. } => "prepare",
        Commands::Groups { .. } => "groups",
        Commands::Rollout { .. } => "rollout",
        Commands::Settings => "settings",
    }
}

/// Override count carried by a command, for log records.
pub fn override_count(command: &Commands) -> usize {
    match command {
        Commands::Compose { overrides, .. }
        | Commands::Validate { overrides }
        | Commands::Prepare { overrides, .. }
        | Commands::Rollout { overrides, .. } => overrides.len(),
        Commands::Groups { .. } | Commands::Settings => 0,
    }
}
