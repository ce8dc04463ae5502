//! torusflow: Hierarchical Experiment Configuration for Continuous GFlowNets
//!
//! Composes experiment configs from a tree of YAML option files (defaults lists,
//! packages, strict overrides, interpolation), validates them against a typed
//! schema, prepares run directories, and provides the hybrid hyper-torus
//! environment the configs parameterize.

pub mod cli;
pub mod compose;
pub mod env;
pub mod error;
pub mod logging;
pub mod run;
pub mod schema;
pub mod settings;
