//! CLI route table against the shipped config tree

use tempfile::TempDir;
use torusflow::cli::{map_error, Commands, RunContext};
use torusflow::error::ApiError;
use torusflow::settings::Settings;

use crate::integration::{config_root, copy_config_tree, fixed_time};

fn context(workspace: &TempDir) -> RunContext {
    let mut settings = Settings::default();
    settings.compose.config_root = config_root();
    RunContext::with_settings(workspace.path().to_path_buf(), settings).with_timestamp(fixed_time())
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_compose_json() {
    let ws = TempDir::new().unwrap();
    let out = context(&ws)
        .execute(&Commands::Compose {
            overrides: args(&["experiments=ctorus_dryrun"]),
            format: "json".to_string(),
            unresolved: false,
        })
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["env"]["length_traj"], 5);
    assert_eq!(json["gflownet"]["optimizer"]["batch_size"], 512);
}

#[test]
fn test_compose_unresolved_keeps_interpolations() {
    let ws = TempDir::new().unwrap();
    let out = context(&ws)
        .execute(&Commands::Compose {
            overrides: Vec::new(),
            format: "yaml".to_string(),
            unresolved: true,
        })
        .unwrap();
    assert!(out.contains("${user.logdir.root}"));
}

#[test]
fn test_validate() {
    let ws = TempDir::new().unwrap();
    let ctx = context(&ws);
    let out = ctx
        .execute(&Commands::Validate {
            overrides: args(&["experiments=ctorus"]),
        })
        .unwrap();
    assert!(out.contains("Config is valid"));
    assert!(out.contains("ctorus"));

    let err = ctx
        .execute(&Commands::Validate {
            overrides: args(&["env.n_dim=0"]),
        })
        .unwrap_err();
    assert!(map_error(&err).starts_with("error: "));
}

#[test]
fn test_groups_json() {
    let ws = TempDir::new().unwrap();
    let out = context(&ws)
        .execute(&Commands::Groups {
            format: "json".to_string(),
        })
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let groups = json["groups"].as_array().unwrap();

    let env = groups.iter().find(|g| g["group"] == "env").unwrap();
    assert_eq!(env["selected"], "ctorus");
    assert_eq!(env["options"], serde_json::json!(["ctorus"]));

    let experiments = groups.iter().find(|g| g["group"] == "experiments").unwrap();
    assert!(experiments["selected"].is_null());
    assert_eq!(
        experiments["options"],
        serde_json::json!(["ctorus", "ctorus_dryrun"])
    );
}

#[test]
fn test_groups_without_composable_primary() {
    let ws = TempDir::new().unwrap();
    let tree = TempDir::new().unwrap();
    copy_config_tree(tree.path());
    std::fs::write(
        tree.path().join("config.yaml"),
        "defaults:\n  - env: missing\n  - _self_\nseed: 0\n",
    )
    .unwrap();

    let mut settings = Settings::default();
    settings.compose.config_root = tree.path().to_path_buf();
    let ctx = RunContext::with_settings(ws.path().to_path_buf(), settings);
    let out = ctx
        .execute(&Commands::Groups {
            format: "json".to_string(),
        })
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let groups = json["groups"].as_array().unwrap();
    assert!(groups.iter().any(|g| g["group"] == "env"));
    assert!(groups.iter().all(|g| g["selected"].is_null()));
}

#[test]
fn test_unknown_format_is_rejected_everywhere() {
    let ws = TempDir::new().unwrap();
    let ctx = context(&ws);
    let commands = [
        Commands::Compose {
            overrides: Vec::new(),
            format: "xml".to_string(),
            unresolved: false,
        },
        Commands::Groups {
            format: "xml".to_string(),
        },
        Commands::Rollout {
            overrides: Vec::new(),
            n: 1,
            seed: Some(1),
            policy: "fixed".to_string(),
            format: "xml".to_string(),
        },
    ];
    for command in &commands {
        assert!(matches!(ctx.execute(command), Err(ApiError::ConfigError(_))));
    }
}

#[test]
fn test_rollout_json_is_deterministic() {
    let ws = TempDir::new().unwrap();
    let ctx = context(&ws);
    let command = Commands::Rollout {
        overrides: args(&["experiments=ctorus_dryrun"]),
        n: 3,
        seed: Some(7),
        policy: "random".to_string(),
        format: "json".to_string(),
    };
    let first = ctx.execute(&command).unwrap();
    assert_eq!(first, ctx.execute(&command).unwrap());

    let json: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(json["seed"], 7);
    let trajectories = json["trajectories"].as_array().unwrap();
    assert_eq!(trajectories.len(), 3);
    assert!(trajectories.iter().all(|t| t["n_actions"] == 5));
}

#[test]
fn test_rollout_rejects_unknown_policy() {
    let ws = TempDir::new().unwrap();
    let result = context(&ws).execute(&Commands::Rollout {
        overrides: Vec::new(),
        n: 1,
        seed: None,
        policy: "greedy".to_string(),
        format: "text".to_string(),
    });
    assert!(matches!(result, Err(ApiError::ConfigError(_))));
}

#[test]
fn test_settings_prints_toml() {
    let ws = TempDir::new().unwrap();
    let out = context(&ws).execute(&Commands::Settings).unwrap();
    let parsed: Settings = toml::from_str(&out).unwrap();
    assert_eq!(parsed.compose.config_name, "config");
    assert_eq!(parsed.compose.config_root, config_root());
}

#[test]
fn test_prepare_creates_run_dir() {
    let ws = TempDir::new().unwrap();
    let ctx = context(&ws);
    let command = Commands::Prepare {
        overrides: args(&["experiments=ctorus", "hydra.run.dir=runs/full"]),
        overwrite: false,
    };

    let out = ctx.execute(&command).unwrap();
    assert!(out.contains("Prepared run directory"));
    assert!(ws.path().join("runs/full/.hydra/meta.json").is_file());

    assert!(matches!(
        ctx.execute(&command),
        Err(ApiError::RunDirExists(_))
    ));
}

#[test]
fn test_prepare_validates_before_creating() {
    let ws = TempDir::new().unwrap();
    let result = context(&ws).execute(&Commands::Prepare {
        overrides: args(&["env.length_traj=0", "hydra.run.dir=runs/bad"]),
        overwrite: false,
    });
    assert!(matches!(result, Err(ApiError::Schema(_))));
    assert!(!ws.path().join("runs/bad").exists());
}
