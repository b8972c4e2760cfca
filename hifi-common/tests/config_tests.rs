//! Tests for configuration file discovery and graceful degradation
//!
//! Tests that manipulate HIFI_SHIM_CONFIG are marked with #[serial] so they
//! never run in parallel with each other.

use hifi_common::config::{DeviceKind, TomlConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
#[serial]
fn test_explicit_path_is_loaded() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config(
        r#"
        port = 4100

        [device]
        kind = "mock"

        [logging]
        level = "debug"
        "#,
    );

    let config = TomlConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.port, 4100);
    assert_eq!(config.device.kind, DeviceKind::Mock);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_missing_explicit_path_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let result = TomlConfig::load_or_default(Some(&missing));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_var_path_is_used() {
    let file = write_config("port = 4200\n");
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = TomlConfig::load_or_default(None).unwrap();
    assert_eq!(config.port, 4200);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_path_beats_env_var() {
    let env_file = write_config("port = 4300\n");
    let cli_file = write_config("port = 4400\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::load_or_default(Some(cli_file.path())).unwrap();
    assert_eq!(config.port, 4400);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_malformed_file_is_reported() {
    env::remove_var(CONFIG_ENV_VAR);
    let file = write_config("port = [not toml");

    let err = TomlConfig::load_or_default(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
