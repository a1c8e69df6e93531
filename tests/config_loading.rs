//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading together with the manager config.

use lifeline_service::bin_common::{load_config_from_env, ConfigType};
use lifeline_service::lifeline::{ConfigError, ManagerConfig, DEFAULT_HEARTBEAT_INTERVAL_MS};
use std::env;
use std::io::Write;

#[test]
fn test_service_config_path_from_env_or_default() {
    env::remove_var("LIFELINE_CONFIG_PATH");
    let config_path = load_config_from_env(ConfigType::Service);
    assert_eq!(config_path.to_str().unwrap(), "config/lifeline.yaml");

    env::set_var("LIFELINE_CONFIG_PATH", "/etc/lifeline/prod.yaml");
    let config_path = load_config_from_env(ConfigType::Service);
    assert_eq!(config_path.to_str().unwrap(), "/etc/lifeline/prod.yaml");
    env::remove_var("LIFELINE_CONFIG_PATH");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/lifeline.yaml");
    let config = ManagerConfig::load(path).unwrap();

    assert_eq!(config.endpoint, "ws://10.0.0.2:8282");
    assert_eq!(config.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
    assert_eq!(config.stale_after_ms, None);
}

#[test]
fn test_load_from_temp_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "endpoint: \"wss://push.example.com/ws\"").unwrap();
    writeln!(file, "stale_after_ms: 30000").unwrap();

    let config = ManagerConfig::load(file.path()).unwrap();
    assert_eq!(config.endpoint, "wss://push.example.com/ws");
    assert_eq!(config.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
    assert_eq!(config.stale_after_ms, Some(30_000));
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_missing_file_is_a_file_error() {
    let result = ManagerConfig::load("does/not/exist.yaml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}
