//! Run directory preparation from composed profiles

use tempfile::TempDir;
use torusflow::error::ApiError;
use torusflow::run::{fingerprint, prepare_run_dir_in, read_meta, HYDRA_DIR};

use crate::integration::composer;

#[test]
fn test_fingerprint_ignores_run_dir_template() {
    let a = composer().compose(&["experiments=ctorus"]).unwrap();
    let b = composer()
        .compose(&["experiments=ctorus", "hydra.run.dir=/somewhere/else"])
        .unwrap();
    let c = composer()
        .compose(&["experiments=ctorus", "env.n_dim=3"])
        .unwrap();

    let fa = fingerprint(&a.resolved).unwrap();
    assert_eq!(fa, fingerprint(&b.resolved).unwrap());
    assert_ne!(fa, fingerprint(&c.resolved).unwrap());
}

#[test]
fn test_profiles_have_distinct_fingerprints() {
    let full = composer().compose(&["experiments=ctorus"]).unwrap();
    let dry = composer().compose(&["experiments=ctorus_dryrun"]).unwrap();
    assert_ne!(
        fingerprint(&full.resolved).unwrap(),
        fingerprint(&dry.resolved).unwrap()
    );
}

#[test]
fn test_prepare_persists_config_and_refuses_existing_dir() {
    let tmp = TempDir::new().unwrap();
    let run_dir = tmp.path().join("runs/dry");
    let dir_override = format!("hydra.run.dir={}", run_dir.display());
    let composed = composer()
        .compose(&["experiments=ctorus_dryrun", dir_override.as_str()])
        .unwrap();

    let run = prepare_run_dir_in(tmp.path(), &composed, false).unwrap();
    assert_eq!(run.path, run_dir);
    assert!(run_dir.join(HYDRA_DIR).join("config.yaml").is_file());
    assert!(run_dir.join(HYDRA_DIR).join("overrides.yaml").is_file());

    let meta = read_meta(&run_dir).unwrap();
    assert_eq!(meta.fingerprint, run.fingerprint);
    assert_eq!(meta.composed_at, "2024-01-02T03:04:05");
    assert_eq!(meta.choices["experiments"], "ctorus_dryrun");

    let saved = std::fs::read_to_string(run_dir.join(HYDRA_DIR).join("config.yaml")).unwrap();
    assert!(saved.contains("length_traj: 5"));

    match prepare_run_dir_in(tmp.path(), &composed, false) {
        Err(ApiError::RunDirExists(path)) => assert_eq!(path, run_dir),
        other => panic!("expected RunDirExists, got {:?}", other),
    }
    assert!(prepare_run_dir_in(tmp.path(), &composed, true).is_ok());
}
