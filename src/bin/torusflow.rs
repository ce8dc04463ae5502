//! torusflow CLI Binary
//!
//! Command-line interface for composing experiment configs and sampling the
//! hyper-torus environment.

use clap::Parser;
use std::process;
use torusflow::cli::{command_name, override_count, Cli, RunContext};
use torusflow::logging::{init_logging, LoggingConfig};
use torusflow::settings::SettingsLoader;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and settings files
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(
        command = command_name(&cli.command),
        overrides = override_count(&cli.command),
        "torusflow starting"
    );

    let context = match RunContext::new(cli.workspace.clone(), cli.settings.clone()) {
        Ok(ctx) => ctx
            .with_config_root(cli.config_root.clone())
            .with_config_name(cli.config_name.clone()),
        Err(e) => {
            error!("Error loading settings: {}", e);
            eprintln!("{}", torusflow::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", torusflow::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and settings.
/// Precedence: CLI flags override settings files override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref settings_path) = cli.settings {
        SettingsLoader::load_from_file(settings_path)
            .ok()
            .map(|s| s.logging)
            .unwrap_or_default()
    } else {
        SettingsLoader::load(&cli.workspace)
            .ok()
            .map(|s| s.logging)
            .unwrap_or_default()
    };

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = if file.is_absolute() {
            file.clone()
        } else {
            cli.workspace.join(file)
        };
    }

    config
}
