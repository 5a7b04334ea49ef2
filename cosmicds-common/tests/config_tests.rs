//! Configuration loading and resolution tests
//!
//! Tests that point XDG_CONFIG_HOME at a temporary directory are marked
//! #[serial] so they never race each other.

use cosmicds_common::config::{
    default_config_file, ServerConfig, TomlConfig, DEFAULT_ALLOWED_ORIGINS, DEFAULT_LOG_LEVEL,
    DEFAULT_PORT,
};
use cosmicds_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// TOML loading
// =============================================================================

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_load_full_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
port = 9000
database_path = "/srv/cosmicds/data.db"
allowed_origins = ["https://a.test", "https://b.test"]
log_level = "debug"
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.port, Some(9000));
    assert_eq!(config.database_path, Some(PathBuf::from("/srv/cosmicds/data.db")));
    assert_eq!(config.allowed_origins, vec!["https://a.test", "https://b.test"]);
    assert_eq!(config.log_level.as_deref(), Some("debug"));
}

#[test]
fn test_partial_file_leaves_rest_unset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = 9100\n").unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.port, Some(9100));
    assert!(config.database_path.is_none());
    assert!(config.allowed_origins.is_empty());
}

#[test]
fn test_unparseable_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = \"not a number\"\n").unwrap();

    match TomlConfig::load(&path) {
        Err(Error::Config(message)) => assert!(message.contains("config.toml")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_load_default_reads_platform_location() {
    let dir = TempDir::new().unwrap();
    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let path = default_config_file().unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "log_level = \"trace\"\n").unwrap();
    let config = TomlConfig::load_default();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    #[cfg(target_os = "linux")]
    assert_eq!(config.log_level.as_deref(), Some("trace"));
    #[cfg(not(target_os = "linux"))]
    let _ = config;
}

#[test]
#[serial]
fn test_load_default_with_broken_file_falls_back() {
    let dir = TempDir::new().unwrap();
    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let path = default_config_file().unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "this is [not toml").unwrap();
    let config = TomlConfig::load_default();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(config, TomlConfig::default());
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_resolve_uses_compiled_defaults() {
    let config = ServerConfig::resolve(None, None, Vec::new(), None, TomlConfig::default());

    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    assert!(config.database_path.ends_with("cosmicds.db"));
    assert_eq!(config.allowed_origins.len(), DEFAULT_ALLOWED_ORIGINS.len());
}

#[test]
fn test_cli_wins_over_toml() {
    let toml = TomlConfig {
        port: Some(9000),
        database_path: Some(PathBuf::from("/toml.db")),
        allowed_origins: Vec::new(),
        log_level: Some("warn".to_string()),
    };

    let config = ServerConfig::resolve(
        Some(7000),
        Some(PathBuf::from("/cli.db")),
        Vec::new(),
        None,
        toml,
    );

    assert_eq!(config.port, 7000);
    assert_eq!(config.database_path, PathBuf::from("/cli.db"));
    assert_eq!(config.log_level, "warn");
}

#[test]
fn test_origins_are_merged_trimmed_and_deduplicated() {
    let toml = TomlConfig {
        allowed_origins: vec!["https://b.test".to_string(), " https://a.test ".to_string()],
        ..TomlConfig::default()
    };

    let config = ServerConfig::resolve(
        None,
        None,
        vec!["https://a.test".to_string(), "".to_string()],
        None,
        toml,
    );

    assert_eq!(config.allowed_origins, vec!["https://a.test", "https://b.test"]);
}
