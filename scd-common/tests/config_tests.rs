//! Unit tests for bootstrap configuration and graceful degradation
//!
//! Tests that manipulate SCD_CONFIG or SCD_EVENT_DIR are marked #[serial]
//! so they never race each other on the process environment.

use scd_common::config::{
    locate_config_file, validate_event_dir, TomlConfig, CONFIG_ENV_VAR, EVENT_DIR_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_event_dir_wins_over_env_and_toml() {
    env::set_var(EVENT_DIR_ENV_VAR, "/tmp/scd-env-events");
    let config = TomlConfig {
        event_dir: Some(PathBuf::from("/tmp/scd-toml-events")),
        ..Default::default()
    };

    let resolved = config.resolve_event_dir(Some(Path::new("/tmp/scd-cli-events")));
    assert_eq!(resolved, PathBuf::from("/tmp/scd-cli-events"));

    env::remove_var(EVENT_DIR_ENV_VAR);
}

#[test]
#[serial]
fn test_env_event_dir_wins_over_toml() {
    env::set_var(EVENT_DIR_ENV_VAR, "/tmp/scd-env-events");
    let config = TomlConfig {
        event_dir: Some(PathBuf::from("/tmp/scd-toml-events")),
        ..Default::default()
    };

    assert_eq!(
        config.resolve_event_dir(None),
        PathBuf::from("/tmp/scd-env-events")
    );

    env::remove_var(EVENT_DIR_ENV_VAR);
}

#[test]
#[serial]
fn test_toml_event_dir_then_default() {
    env::remove_var(EVENT_DIR_ENV_VAR);

    let config = TomlConfig {
        event_dir: Some(PathBuf::from("/tmp/scd-toml-events")),
        ..Default::default()
    };
    assert_eq!(
        config.resolve_event_dir(None),
        PathBuf::from("/tmp/scd-toml-events")
    );

    // Compiled default ends in the frontend's logs folder
    let resolved = TomlConfig::default().resolve_event_dir(None);
    assert!(resolved.ends_with("logs"));
}

#[test]
#[serial]
fn test_locate_config_prefers_env() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "media_root = \"/srv/media\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(locate_config_file(None), Some(path.clone()));

    let loaded = TomlConfig::load(None);
    assert_eq!(loaded.media_root(), PathBuf::from("/srv/media"));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_invalid_config_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    assert!(TomlConfig::from_file(&path).is_err());

    // Loading through the degrading path never fails
    let config = TomlConfig::load(Some(path.as_path()));
    assert!(config.media_root.is_none());
    assert_eq!(config.ingest.retry_attempts, 5);
}

#[test]
fn test_full_config_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
event_dir = "/home/user/ES-DE/logs"
media_root = "/home/user/ES-DE/downloaded_media"
music_root = "/home/user/music"
widget_store = "/home/user/.local/share/scd/widgets.json"

[logging]
level = "debug"
file = "/tmp/scd.log"

[ingest]
coalesce_ms = 40
post_launch_window_ms = 700
"#,
    )
    .unwrap();

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/scd.log")));
    assert_eq!(config.ingest.coalesce_ms, 40);
    assert_eq!(config.ingest.post_launch_window_ms, 700);
    assert_eq!(config.ingest.settle_ms, 50);
    assert_eq!(
        config.widget_store(),
        PathBuf::from("/home/user/.local/share/scd/widgets.json")
    );
}

#[test]
fn test_validate_event_dir() {
    let temp = TempDir::new().unwrap();
    assert!(validate_event_dir(temp.path()).is_ok());

    let missing = temp.path().join("missing");
    assert!(validate_event_dir(&missing).is_err());

    let file = temp.path().join("file.txt");
    std::fs::write(&file, "x").unwrap();
    assert!(validate_event_dir(&file).is_err());
}
