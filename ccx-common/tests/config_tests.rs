//! Configuration resolution tests
//!
//! Uses serial_test because these tests manipulate CCX_* environment
//! variables, which are process-global.

use ccx_common::config::{
    load_toml_config, resolve_config, CacheConfig, ConfigOverrides, DEFAULT_FETCH_TIMEOUT_MS,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "CCX_COUNTRIES_URL",
    "CCX_RATES_URL",
    "CCX_FETCH_TIMEOUT_MS",
    "CCX_DATABASE_PATH",
    "CCX_ARTIFACT_PATH",
    "CCX_BIND_ADDR",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_defaults_are_valid() {
    let config = CacheConfig::default();
    assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
    assert!(config.artifact_path.ends_with("summary.png"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "fetch_timeout_ms = 2500\n");

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.fetch_timeout_ms, 2500);
    assert_eq!(config.rates_url, CacheConfig::default().rates_url);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "rates_url = \"http://toml.example/rates\"\n");

    env::set_var("CCX_RATES_URL", "http://env.example/rates");
    let overrides = ConfigOverrides {
        config_file: Some(path),
        ..Default::default()
    };
    let config = resolve_config(&overrides).unwrap();
    clear_env();

    assert_eq!(config.rates_url, "http://env.example/rates");
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var("CCX_BIND_ADDR", "127.0.0.1:4000");
    let overrides = ConfigOverrides {
        config_file: Some(path),
        bind_addr: Some("127.0.0.1:5000".to_string()),
        ..Default::default()
    };
    let config = resolve_config(&overrides).unwrap();
    clear_env();

    assert_eq!(config.bind_addr, "127.0.0.1:5000");
}

#[test]
#[serial]
fn test_invalid_env_timeout_is_config_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var("CCX_FETCH_TIMEOUT_MS", "soon");
    let overrides = ConfigOverrides {
        config_file: Some(path),
        ..Default::default()
    };
    let result = resolve_config(&overrides);
    clear_env();

    assert!(matches!(result, Err(ccx_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_zero_timeout_rejected() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let overrides = ConfigOverrides {
        config_file: Some(write_config(&dir, "")),
        fetch_timeout_ms: Some(0),
        ..Default::default()
    };
    let result = resolve_config(&overrides);
    assert!(matches!(result, Err(ccx_common::Error::Config(msg)) if msg.contains("fetch_timeout_ms")));
}

#[test]
fn test_missing_explicit_config_file_is_error() {
    let result = load_toml_config(&PathBuf::from("/nonexistent/ccx/config.toml"));
    assert!(matches!(result, Err(ccx_common::Error::Config(_))));
}
