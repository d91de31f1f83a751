//! Integration tests for configuration file loading and path resolution
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate SHIELD_CONFIG are marked with #[serial].

use serial_test::serial;
use shield_common::config::{resolve_config_path, PipelineConfig, CONFIG_ENV_VAR};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// File loading
// ============================================================================

#[test]
fn test_load_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("heartbeat.toml");
    std::fs::write(
        &path,
        r#"
        lookback_days = 7
        start_date = "20240101"

        [source]
        input_dir = "/data/pings"
        channel = "beta"

        [storage]
        upload_endpoint = "http://localhost:9000"
        csv_content_type = "application/json"

        [history]
        allow_missing = true

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = PipelineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.lookback_days, 7);
    assert_eq!(config.start().unwrap().unwrap().to_string(), "20240101");
    assert_eq!(config.end().unwrap(), None);
    assert_eq!(config.source.input_dir, PathBuf::from("/data/pings"));
    assert_eq!(config.source.channel, "beta");
    assert_eq!(config.source.app, "Firefox");
    assert_eq!(
        config.storage.upload_endpoint.as_deref(),
        Some("http://localhost:9000")
    );
    assert_eq!(config.storage.csv_content_type, "application/json");
    assert!(config.history.allow_missing);
    assert_eq!(config.logging.level, "debug");
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_missing_explicit_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = PipelineConfig::load(Some(&temp_dir.path().join("absent.toml")));
    assert!(result.is_err());
}

#[test]
fn test_load_malformed_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "lookback_days = \"three\"").unwrap();

    let err = PipelineConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

// ============================================================================
// Path resolution
// ============================================================================

#[test]
#[serial]
fn test_cli_path_overrides_env() {
    std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    std::env::set_var(CONFIG_ENV_VAR, "/from/env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_path_ignored() {
    std::env::set_var(CONFIG_ENV_VAR, "");

    let resolved = resolve_config_path(None);
    assert_ne!(resolved, Some(PathBuf::from("")));

    std::env::remove_var(CONFIG_ENV_VAR);
}
