//! Property-based tests for composition determinism

use chrono::NaiveDate;
use proptest::prelude::*;
use serde_yaml::Value;
use std::path::PathBuf;
use torusflow::compose::{merge, Composer, ConfigRepository, MergeMode};
use torusflow::run::fingerprint;

fn composer() -> Composer {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");
    let timestamp = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    Composer::new(ConfigRepository::new(&root).unwrap(), "config").with_timestamp(timestamp)
}

/// Same repository, overrides and clock always give the same tree
#[test]
fn test_compose_determinism_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let composer = composer();

    runner
        .run(
            &(1usize..8, 1usize..40, any::<bool>()),
            |(n_dim, length_traj, dryrun)| {
                let profile = if dryrun { "ctorus_dryrun" } else { "ctorus" };
                let overrides = vec![
                    format!("experiments={}", profile),
                    format!("env.n_dim={}", n_dim),
                    format!("env.length_traj={}", length_traj),
                ];
                let first = composer.compose(&overrides).unwrap();
                let second = composer.compose(&overrides).unwrap();

                assert_eq!(first.resolved, second.resolved);
                assert_eq!(
                    first.get("env.length_traj").and_then(Value::as_u64),
                    Some(length_traj as u64)
                );
                assert_eq!(
                    fingerprint(&first.resolved).unwrap(),
                    fingerprint(&second.resolved).unwrap()
                );
                Ok(())
            },
        )
        .unwrap();
}

/// Applying the same patch twice leaves the tree as after the first time
#[test]
fn test_patch_idempotence_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let base = composer().compose::<&str>(&[]).unwrap().raw;

    runner
        .run(
            &(1i64..100, -10.0f64..10.0, "[a-z]{1,12}"),
            |(batch_size, lr, project_name)| {
                let patch: Value = serde_yaml::from_str(&format!(
                    "gflownet:\n  optimizer:\n    batch_size: {}\n    lr: {:?}\nlogger:\n  project_name: \"{}\"\n",
                    batch_size, lr, project_name
                ))
                .unwrap();

                let mut once = base.clone();
                merge(&mut once, &patch, MergeMode::Patch).unwrap();
                let mut twice = once.clone();
                merge(&mut twice, &patch, MergeMode::Patch).unwrap();

                assert_eq!(once, twice);
                Ok(())
            },
        )
        .unwrap();
}

/// The run directory never feeds into the fingerprint
#[test]
fn test_fingerprint_ignores_run_dir_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let composer = composer();
    let reference = fingerprint(&composer.compose(&["experiments=ctorus"]).unwrap().resolved).unwrap();

    runner
        .run(&"/[a-z0-9_]{1,10}(/[a-z0-9_]{1,10}){0,3}", |dir| {
            let overrides = vec![
                "experiments=ctorus".to_string(),
                format!("hydra.run.dir={}", dir),
            ];
            let composed = composer.compose(&overrides).unwrap();
            assert_eq!(fingerprint(&composed.resolved).unwrap(), reference);
            Ok(())
        })
        .unwrap();
}
