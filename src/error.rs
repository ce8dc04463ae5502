//! Error types for configuration composition, the experiment schema and the
//! hyper-torus environment.

use std::path::PathBuf;
use thiserror::Error;

/// Composition errors. All of them are fatal before any run starts.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Primary config not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Could not find '{group}/{option}'. Available options in '{group}': {}", available.join(", "))]
    OptionNotFound {
        group: String,
        option: String,
        available: Vec<String>,
    },

    #[error("Could not override '{0}'. No match in the defaults list")]
    NoMatchInDefaults(String),

    #[error("Group '{0}' is already in the defaults list (use '{0}=<option>' to change it)")]
    GroupAlreadyPresent(String),

    #[error("Defaults overrides did not settle after {0} passes (cyclic overrides?)")]
    DefaultsCycle(usize),

    #[error("Invalid defaults entry in {file}: {reason}")]
    InvalidDefaults { file: String, reason: String },

    #[error("Key '{0}' is not in the composed config")]
    UnknownKey(String),

    #[error("Key '{0}' is already in the composed config (use '++{0}=...' to force)")]
    KeyExists(String),

    #[error("Type mismatch at '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Cannot delete '{key}': value is {actual}, not {expected}")]
    ValueMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid override '{0}': {1}")]
    InvalidOverride(String, String),

    #[error("Unresolved interpolation '{expr}' at '{key}': {reason}")]
    UnresolvedInterpolation {
        key: String,
        expr: String,
        reason: String,
    },

    #[error("Interpolation cycle: {}", .0.join(" -> "))]
    InterpolationCycle(Vec<String>),

    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed schema errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Config does not match the experiment schema: {0}")]
    Deserialize(String),

    #[error("Invalid experiment config:\n  {}", .0.join("\n  "))]
    Violations(Vec<String>),
}

/// Hyper-torus environment errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid readable state '{0}'")]
    InvalidReadable(String),

    #[error("Invalid environment config: {0}")]
    InvalidConfig(String),

    #[error("Rejection sampling failed: {0}")]
    Rejection(String),
}

/// Top-level errors surfaced by the CLI and the run preparation API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Run directory {0} already exists (pass --overwrite to reuse it)")]
    RunDirExists(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(err: serde_yaml::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}
