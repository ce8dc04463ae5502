//! Experiment Schema
//!
//! Typed view of a resolved experiment config. The root and every section
//! reject unknown fields so that a typo surviving composition (e.g. through
//! `++key=value`) still fails before a run starts.

use crate::compose::ComposedConfig;
use crate::env::{RewardFunc, RewardTransform};
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Root experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub device: Device,

    pub env: EnvConfig,
    pub proxy: ProxyConfig,
    pub gflownet: GFlowNetConfig,
    pub logger: LoggerConfig,
    pub user: UserConfig,
    pub hydra: HydraConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

/// Parameters of a fixed policy distribution over angle increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionParams {
    pub vonmises_mean: f64,
    /// Log concentration.
    pub vonmises_concentration: f64,
}

/// Hyper-torus environment section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    pub id: String,
    pub n_dim: usize,
    pub length_traj: usize,
    pub reward_func: RewardFunc,
    pub reward_beta: f64,
    pub reward_norm: f64,
    pub reward_min: f64,
    pub do_nonzero_source_prob: bool,
    pub vonmises_min_concentration: f64,
    pub fixed_distribution: DistributionParams,
    pub random_distribution: DistributionParams,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            id: "ctorus".to_string(),
            n_dim: 2,
            length_traj: 1,
            reward_func: RewardFunc::Boltzmann,
            reward_beta: 1.0,
            reward_norm: 1.0,
            reward_min: 1e-8,
            do_nonzero_source_prob: true,
            vonmises_min_concentration: 1e-3,
            fixed_distribution: DistributionParams {
                vonmises_mean: 0.0,
                vonmises_concentration: 0.5,
            },
            random_distribution: DistributionParams {
                vonmises_mean: 0.0,
                vonmises_concentration: 0.001,
            },
        }
    }
}

impl EnvConfig {
    pub fn reward_transform(&self) -> RewardTransform {
        RewardTransform {
            func: self.reward_func,
            beta: self.reward_beta,
            norm: self.reward_norm,
            min_reward: self.reward_min,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.n_dim == 0 {
            errors.push("env.n_dim: must be at least 1".to_string());
        }
        if self.length_traj == 0 {
            errors.push("env.length_traj: must be at least 1".to_string());
        }
        if !(self.reward_norm > 0.0) {
            errors.push(format!("env.reward_norm: must be positive, got {}", self.reward_norm));
        }
        if !(self.reward_min > 0.0) {
            errors.push(format!("env.reward_min: must be positive, got {}", self.reward_min));
        }
        if !(self.vonmises_min_concentration > 0.0) {
            errors.push(format!(
                "env.vonmises_min_concentration: must be positive, got {}",
                self.vonmises_min_concentration
            ));
        }
        errors
    }
}

/// Proxy section. Only the parameters are typed; no proxy is instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(rename = "_target_")]
    pub target: String,
    #[serde(default)]
    pub normalize: bool,
    pub alpha: f64,
    pub beta: f64,
}

/// GFlowNet agent section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GFlowNetConfig {
    pub loss: String,
    #[serde(default)]
    pub random_action_prob: f64,
    #[serde(default = "default_temperature_logits")]
    pub temperature_logits: f64,
    pub optimizer: OptimizerConfig,
    pub policy: PolicyConfig,
}

fn default_temperature_logits() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    pub method: String,
    pub batch_size: usize,
    pub lr: f64,
    pub z_dim: usize,
    pub lr_z_mult: f64,
    pub n_train_steps: usize,
    pub lr_decay_period: usize,
    pub lr_decay_gamma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub forward: PolicyModelConfig,
    pub backward: PolicyModelConfig,
}

/// Shape of a policy model. The model itself is not built here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyModelConfig {
    #[serde(rename = "type")]
    pub model_type: String,
    pub n_hid: usize,
    pub n_layers: usize,
    #[serde(default)]
    pub shared_weights: bool,
    #[serde(default)]
    pub checkpoint: Option<String>,
}

impl GFlowNetConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.loss.trim().is_empty() {
            errors.push("gflownet.loss: must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.random_action_prob) {
            errors.push(format!(
                "gflownet.random_action_prob: must be in [0, 1], got {}",
                self.random_action_prob
            ));
        }
        if !(self.temperature_logits > 0.0) {
            errors.push(format!(
                "gflownet.temperature_logits: must be positive, got {}",
                self.temperature_logits
            ));
        }

        let opt = &self.optimizer;
        if opt.batch_size == 0 {
            errors.push("gflownet.optimizer.batch_size: must be at least 1".to_string());
        }
        if !(opt.lr > 0.0) {
            errors.push(format!("gflownet.optimizer.lr: must be positive, got {}", opt.lr));
        }
        if opt.z_dim == 0 {
            errors.push("gflownet.optimizer.z_dim: must be at least 1".to_string());
        }
        if !(opt.lr_z_mult > 0.0) {
            errors.push(format!(
                "gflownet.optimizer.lr_z_mult: must be positive, got {}",
                opt.lr_z_mult
            ));
        }
        if opt.n_train_steps == 0 {
            errors.push("gflownet.optimizer.n_train_steps: must be at least 1".to_string());
        }

        for (name, model) in [("forward", &self.policy.forward), ("backward", &self.policy.backward)] {
            if model.n_hid == 0 {
                errors.push(format!("gflownet.policy.{}.n_hid: must be at least 1", name));
            }
            if model.n_layers == 0 {
                errors.push(format!("gflownet.policy.{}.n_layers: must be at least 1", name));
            }
        }
        errors
    }
}

/// Experiment logger section. A period of 0 or less disables the activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default)]
    pub online: bool,
    pub project_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub lightweight: bool,
    #[serde(default)]
    pub debug: bool,
    pub test: TestConfig,
    pub oracle: PeriodConfig,
    pub checkpoints: PeriodConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub period: i64,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodConfig {
    pub period: i64,
}

impl PeriodConfig {
    pub fn enabled(&self) -> bool {
        self.period > 0
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.project_name.trim().is_empty() {
            errors.push("logger.project_name: must not be empty".to_string());
        }
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.trim().is_empty() {
                errors.push(format!("logger.tags[{}]: must not be empty", i));
            }
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub logdir: RootConfig,
    #[serde(default)]
    pub data: Option<RootConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    pub root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HydraConfig {
    pub run: HydraRunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HydraRunConfig {
    pub dir: String,
}

impl ExperimentConfig {
    /// Deserialize a resolved tree without validating it.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        serde_yaml::from_value(value.clone()).map_err(|e| SchemaError::Deserialize(e.to_string()))
    }

    /// Deserialize and validate the resolved tree of a composition.
    pub fn from_composed(composed: &ComposedConfig) -> Result<Self, SchemaError> {
        let config = Self::from_value(&composed.resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section, reporting all violations at once.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut errors = self.env.validate();
        errors.extend(self.gflownet.validate());
        errors.extend(self.logger.validate());
        if self.user.logdir.root.trim().is_empty() {
            errors.push("user.logdir.root: must not be empty".to_string());
        }
        if self.hydra.run.dir.trim().is_empty() {
            errors.push("hydra.run.dir: must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violations(errors))
        }
    }
}
