//! Composition of the shipped config tree and its two run profiles

use serde_yaml::Value;
use tempfile::TempDir;
use torusflow::compose::ComposedConfig;
use torusflow::error::{ComposeError, SchemaError};
use torusflow::schema::ExperimentConfig;

use crate::integration::{composer, composer_at, copy_config_tree};

fn int(composed: &ComposedConfig, key: &str) -> i64 {
    composed
        .get(key)
        .and_then(Value::as_i64)
        .unwrap_or_else(|| panic!("{} is not an integer", key))
}

fn string(composed: &ComposedConfig, key: &str) -> String {
    composed
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("{} is not a string", key))
        .to_string()
}

#[test]
fn test_base_config() {
    let composed = composer().compose::<&str>(&[]).unwrap();
    assert_eq!(int(&composed, "env.n_dim"), 2);
    assert_eq!(int(&composed, "env.length_traj"), 1);
    assert_eq!(int(&composed, "gflownet.optimizer.batch_size"), 16);
    assert_eq!(string(&composed, "env.reward_func"), "boltzmann");
    assert_eq!(composed.choices.get("env").map(String::as_str), Some("ctorus"));
    assert!(!composed.choices.contains_key("experiments"));
    assert!(string(&composed, "hydra.run.dir").ends_with("/2024-01-02_03-04-05"));
    ExperimentConfig::from_composed(&composed).unwrap();
}

#[test]
fn test_full_run_profile() {
    let composed = composer().compose(&["experiments=ctorus"]).unwrap();
    assert_eq!(int(&composed, "env.length_traj"), 20);
    assert_eq!(int(&composed, "gflownet.optimizer.batch_size"), 100);
    assert_eq!(int(&composed, "gflownet.optimizer.n_train_steps"), 10000);
    assert_eq!(int(&composed, "gflownet.policy.forward.n_hid"), 512);
    assert_eq!(string(&composed, "gflownet.policy.backward.checkpoint"), "backward");
    assert_eq!(string(&composed, "env.reward_func"), "identity");
    // Untouched group values survive the patch.
    assert_eq!(int(&composed, "gflownet.optimizer.z_dim"), 16);
    assert!(string(&composed, "hydra.run.dir").ends_with("/ctorus/2024-01-02_03-04-05"));
    assert_eq!(composed.choices["experiments"], "ctorus");

    let config = ExperimentConfig::from_composed(&composed).unwrap();
    assert_eq!(config.logger.tags, vec!["gflownet", "continuous", "ctorus"]);
}

#[test]
fn test_dryrun_profile() {
    let composed = composer().compose(&["experiments=ctorus_dryrun"]).unwrap();
    assert_eq!(int(&composed, "env.length_traj"), 5);
    assert_eq!(int(&composed, "gflownet.optimizer.batch_size"), 512);
    assert_eq!(int(&composed, "gflownet.optimizer.n_train_steps"), 10);
    assert_eq!(int(&composed, "gflownet.policy.forward.n_hid"), 32);
    assert!(string(&composed, "hydra.run.dir").contains("/debug/ctorus/"));

    let config = ExperimentConfig::from_composed(&composed).unwrap();
    assert!(config.logger.tags.contains(&"dryrun".to_string()));
}

#[test]
fn test_cli_overrides_apply_after_profile() {
    let composed = composer()
        .compose(&["experiments=ctorus", "env.length_traj=7", "gflownet.optimizer.lr=0.01"])
        .unwrap();
    assert_eq!(int(&composed, "env.length_traj"), 7);
    assert_eq!(composed.get("gflownet.optimizer.lr").and_then(Value::as_f64), Some(0.01));
    assert_eq!(
        composed.overrides,
        vec!["experiments=ctorus", "env.length_traj=7", "gflownet.optimizer.lr=0.01"]
    );
}

#[test]
fn test_missing_option_fails() {
    match composer().compose(&["env=grid"]) {
        Err(ComposeError::OptionNotFound {
            group,
            option,
            available,
        }) => {
            assert_eq!(group, "env");
            assert_eq!(option, "grid");
            assert_eq!(available, vec!["ctorus"]);
        }
        other => panic!("expected OptionNotFound, got {:?}", other),
    }
    assert!(matches!(
        composer().compose(&["experiments=missing"]),
        Err(ComposeError::OptionNotFound { .. })
    ));
}

#[test]
fn test_unknown_key_and_type_mismatch_from_cli() {
    assert!(matches!(
        composer().compose(&["env.n_dims=3"]),
        Err(ComposeError::UnknownKey(key)) if key == "env.n_dims"
    ));
    assert!(matches!(
        composer().compose(&["env.n_dim=three"]),
        Err(ComposeError::TypeMismatch { .. })
    ));
    assert!(matches!(
        composer().compose(&["gflownet.optimizer.batch_size=0.5"]),
        Err(ComposeError::TypeMismatch { .. })
    ));
    assert!(matches!(
        composer().compose(&["+env.n_dim=3"]),
        Err(ComposeError::KeyExists(_))
    ));
}

#[test]
fn test_unknown_key_and_type_mismatch_from_files() {
    let dir = TempDir::new().unwrap();
    copy_config_tree(dir.path());
    std::fs::write(
        dir.path().join("experiments/typo.yaml"),
        "# @package _global_\nenv:\n  lenght_traj: 20\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("experiments/badtype.yaml"),
        "# @package _global_\ngflownet:\n  optimizer:\n    batch_size: large\n",
    )
    .unwrap();

    let composer = composer_at(dir.path());
    assert!(matches!(
        composer.compose(&["experiments=typo"]),
        Err(ComposeError::UnknownKey(key)) if key == "env.lenght_traj"
    ));
    assert!(matches!(
        composer.compose(&["experiments=badtype"]),
        Err(ComposeError::TypeMismatch { key, .. }) if key == "gflownet.optimizer.batch_size"
    ));
}

#[test]
fn test_force_add_reaches_schema() {
    let composed = composer().compose(&["++env.extra=1"]).unwrap();
    assert_eq!(int(&composed, "env.extra"), 1);
    assert!(matches!(
        ExperimentConfig::from_composed(&composed),
        Err(SchemaError::Deserialize(_))
    ));
}

#[test]
fn test_force_added_top_level_typo_fails_schema() {
    let composed = composer().compose(&["++seeed=3"]).unwrap();
    assert_eq!(int(&composed, "seeed"), 3);
    assert!(matches!(
        ExperimentConfig::from_composed(&composed),
        Err(SchemaError::Deserialize(msg)) if msg.contains("seeed")
    ));
}

#[test]
fn test_run_dir_template_changes_nothing_else() {
    let base = composer().compose(&["experiments=ctorus"]).unwrap();
    let moved = composer()
        .compose(&["experiments=ctorus", "hydra.run.dir=/tmp/elsewhere/${now:%H}"])
        .unwrap();
    assert_eq!(
        moved.get("hydra.run.dir").and_then(Value::as_str),
        Some("/tmp/elsewhere/03")
    );

    let strip = |c: &ComposedConfig| {
        let mut tree = c.resolved.clone();
        tree.as_mapping_mut().unwrap().remove("hydra");
        tree
    };
    assert_eq!(strip(&base), strip(&moved));
}

#[test]
fn test_group_overrides_edit_defaults() {
    assert!(matches!(
        composer().compose(&["+experiments=ctorus"]),
        Err(ComposeError::GroupAlreadyPresent(_))
    ));
    assert!(matches!(
        composer().compose(&["~proxy"]),
        Ok(c) if c.get("proxy").is_none()
    ));
}
