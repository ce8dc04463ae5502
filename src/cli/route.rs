//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_composed, format_groups_json, format_groups_text, format_prepare_result,
    format_rollouts_json, format_rollouts_text, format_validation_summary, GroupRow, RolloutRow,
};
use crate::compose::{ComposedConfig, Composer, ConfigRepository};
use crate::env::{HybridTorus, SamplingMethod};
use crate::error::ApiError;
use crate::run::prepare_run_dir_in;
use crate::schema::ExperimentConfig;
use crate::settings::{Settings, SettingsLoader};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace root and effective settings.
pub struct RunContext {
    workspace_root: PathBuf,
    settings: Settings,
    timestamp: Option<NaiveDateTime>,
}

impl RunContext {
    /// Create run context from workspace root and optional settings path.
    pub fn new(workspace_root: PathBuf, settings_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let settings = match settings_path {
            Some(ref path) => SettingsLoader::load_from_file(path)?,
            None => SettingsLoader::load(&workspace_root)?,
        };
        Ok(Self::with_settings(workspace_root, settings))
    }

    pub fn with_settings(workspace_root: PathBuf, settings: Settings) -> Self {
        Self {
            workspace_root,
            settings,
            timestamp: None,
        }
    }

    /// Override the config tree root from the command line.
    pub fn with_config_root(mut self, config_root: Option<PathBuf>) -> Self {
        if let Some(root) = config_root {
            self.settings.compose.config_root = root;
        }
        self
    }

    /// Override the primary config name from the command line.
    pub fn with_config_name(mut self, config_name: Option<String>) -> Self {
        if let Some(name) = config_name {
            self.settings.compose.config_name = name;
        }
        self
    }

    /// Pin the composition timestamp.
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    fn composer(&self) -> Result<Composer, ApiError> {
        let root = self.settings.config_root(&self.workspace_root);
        let repo = ConfigRepository::new(&root)?;
        let composer = Composer::new(repo, self.settings.compose.config_name.clone());
        Ok(match self.timestamp {
            Some(ts) => composer.with_timestamp(ts),
            None => composer,
        })
    }

    fn compose(&self, overrides: &[String]) -> Result<ComposedConfig, ApiError> {
        let composed = self.composer()?.compose(overrides)?;
        debug!(choices = ?composed.choices, "Composed experiment config");
        Ok(composed)
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Compose {
                overrides,
                format,
                unresolved,
            } => {
                let composed = self.compose(overrides)?;
                format_composed(&composed, format, *unresolved)
            }
            Commands::Validate { overrides } => {
                let composed = self.compose(overrides)?;
                let config = ExperimentConfig::from_composed(&composed)?;
                Ok(format_validation_summary(&composed, &config))
            }
            Commands::Prepare {
                overrides,
                overwrite,
            } => {
                let composed = self.compose(overrides)?;
                ExperimentConfig::from_composed(&composed)?;
                let run = prepare_run_dir_in(
                    &self.workspace_root,
                    &composed,
                    *overwrite || self.settings.run.overwrite,
                )?;
                Ok(format_prepare_result(&run))
            }
            Commands::Groups { format } => self.handle_groups(format),
            Commands::Rollout {
                overrides,
                n,
                seed,
                policy,
                format,
            } => self.handle_rollout(overrides, *n, *seed, policy, format),
            Commands::Settings => self.settings.to_toml(),
        }
    }

    fn handle_groups(&self, format: &str) -> Result<String, ApiError> {
        let composer = self.composer()?;
        // Defaults from the primary config; a broken primary still lists groups.
        let choices = match composer.compose::<&str>(&[]) {
            Ok(composed) => composed.choices,
            Err(err) => {
                debug!(error = %err, "Primary config did not compose; listing groups without defaults");
                Default::default()
            }
        };
        let repo = composer.repository();
        let rows: Vec<GroupRow> = repo
            .groups()
            .into_iter()
            .map(|group| GroupRow {
                options: repo.options(&group),
                selected: choices.get(&group).cloned(),
                group,
            })
            .collect();
        match format {
            "json" => format_groups_json(&rows),
            "text" => Ok(format_groups_text(&rows)),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_rollout(
        &self,
        overrides: &[String],
        n: usize,
        seed: Option<u64>,
        policy: &str,
        format: &str,
    ) -> Result<String, ApiError> {
        let composed = self.compose(overrides)?;
        let config = ExperimentConfig::from_composed(&composed)?;
        let mut env = HybridTorus::from_config(&config.env)?;

        let (output, method) = match policy {
            "fixed" => (env.fixed_policy_output().to_vec(), SamplingMethod::Policy),
            "random" => (env.random_policy_output().to_vec(), SamplingMethod::Policy),
            "uniform" => (env.fixed_policy_output().to_vec(), SamplingMethod::Uniform),
            other => {
                return Err(ApiError::ConfigError(format!(
                    "Invalid policy: {} (must be 'fixed', 'random' or 'uniform')",
                    other
                )))
            }
        };

        let seed = seed.unwrap_or(config.seed);
        let mut rng = StdRng::seed_from_u64(seed);
        info!(n, seed, policy, "Sampling trajectories");

        let mut rows = Vec::with_capacity(n);
        for index in 0..n {
            let trajectory = env.sample_trajectory(
                &output,
                method,
                config.gflownet.temperature_logits,
                &mut rng,
            )?;
            let terminal = trajectory.terminal().unwrap_or_else(|| env.source()).clone();
            rows.push(RolloutRow {
                index,
                terminal: env.state_to_readable(&terminal),
                angles: terminal.angles.clone(),
                n_actions: terminal.n_actions,
                logprob: trajectory.logprob,
            });
        }

        match format {
            "json" => format_rollouts_json(&rows, policy, seed),
            "text" => Ok(format_rollouts_text(&rows, policy, seed)),
            other => Err(invalid_format(other)),
        }
    }
}

fn invalid_format(format: &str) -> ApiError {
    ApiError::ConfigError(format!(
        "Invalid format: {} (must be 'text' or 'json')",
        format
    ))
}
