//! Integration tests for config composition, run preparation and the torus environment

mod cli_commands;
mod compose_profiles;
mod run_dir;
mod settings_xdg;
mod test_utils;
mod torus_env;

pub use test_utils::*;
