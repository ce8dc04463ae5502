//! Integration tests for layered tool settings

use std::fs;
use tempfile::TempDir;
use torusflow::settings::{global_config_path, SettingsLoader, WORKSPACE_DIR};

use crate::integration::with_xdg_env;

#[test]
fn test_global_settings_from_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    with_xdg_env(&test_dir, || {
        let path = global_config_path().unwrap();
        assert_eq!(path, test_dir.path().join("xdg/torusflow/config.toml"));

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[compose]\nconfig_name = \"from_xdg\"\n").unwrap();

        let settings = SettingsLoader::load(workspace.path()).unwrap();
        assert_eq!(settings.compose.config_name, "from_xdg");
    });
}

#[test]
fn test_global_settings_fall_back_to_home() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    with_xdg_env(&test_dir, || {
        std::env::remove_var("XDG_CONFIG_HOME");
        let path = global_config_path().unwrap();
        assert_eq!(path, test_dir.path().join("home/.config/torusflow/config.toml"));

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[run]\noverwrite = true\n").unwrap();

        let settings = SettingsLoader::load(workspace.path()).unwrap();
        assert!(settings.run.overwrite);
    });
}

#[test]
fn test_workspace_settings_override_global() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();

    with_xdg_env(&test_dir, || {
        let global = global_config_path().unwrap();
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[compose]\nconfig_root = \"shared/config\"\nconfig_name = \"global\"\n",
        )
        .unwrap();

        let ws_dir = workspace.path().join(WORKSPACE_DIR);
        fs::create_dir_all(&ws_dir).unwrap();
        fs::write(ws_dir.join("config.toml"), "[compose]\nconfig_name = \"local\"\n").unwrap();

        let settings = SettingsLoader::load(workspace.path()).unwrap();
        assert_eq!(settings.compose.config_name, "local");
        assert_eq!(
            settings.config_root(workspace.path()),
            workspace.path().join("shared/config")
        );
    });
}
