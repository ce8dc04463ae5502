//! CLI parse: clap types for torusflow. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// torusflow CLI - compose experiment configs and drive the hyper-torus environment
#[derive(Parser)]
#[command(name = "torusflow")]
#[command(about = "Compose hierarchical experiment configs for continuous GFlowNets on a hyper-torus")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Settings file path (replaces the global and workspace settings files)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Config tree root (overrides compose.config_root)
    #[arg(long)]
    pub config_root: Option<PathBuf>,

    /// Primary config name (overrides compose.config_name)
    #[arg(long)]
    pub config_name: Option<String>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the experiment config and print it
    Compose {
        /// Overrides: key=value, +key=value, ++key=value, ~key, group=option
        overrides: Vec<String>,
        /// Output format (yaml, json, flat)
        #[arg(long, default_value = "yaml")]
        format: String,
        /// Print the merged tree before interpolation
        #[arg(long)]
        unresolved: bool,
    },
    /// Compose and check the config against the experiment schema
    Validate {
        /// Overrides: key=value, +key=value, ++key=value, ~key, group=option
        overrides: Vec<String>,
    },
    /// Compose, validate and create the run directory
    Prepare {
        /// Overrides: key=value, +key=value, ++key=value, ~key, group=option
        overrides: Vec<String>,
        /// Reuse an existing run directory
        #[arg(long)]
        overwrite: bool,
    },
    /// List config groups and their options
    Groups {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Sample trajectories in the configured environment
    Rollout {
        /// Overrides: key=value, +key=value, ++key=value, ~key, group=option
        overrides: Vec<String>,
        /// Number of trajectories
        #[arg(long, default_value = "1")]
        n: usize,
        /// RNG seed (default: the config's seed)
        #[arg(long)]
        seed: Option<u64>,
        /// Policy: fixed, random or uniform
        #[arg(long, default_value = "fixed")]
        policy: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective tool settings as TOML
    Settings,
}
