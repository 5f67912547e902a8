//! Configuration loading and root folder resolution tests
//!
//! Tests that manipulate SOWLINK_ROOT_FOLDER are marked with #[serial]
//! so they never run in parallel with each other.

use serial_test::serial;
use sowlink_common::config::{
    default_root_folder, load_toml_config, parse_toml_config, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use sowlink_common::Error;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_empty_toml_yields_defaults() {
    let config = parse_toml_config("").unwrap();

    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.reconciliation.high_confidence_threshold, 0.9);
    assert_eq!(config.reconciliation.low_confidence_threshold, 0.7);
    assert_eq!(config.reconciliation.coordinate_epsilon_deg, 0.0001);
    assert_eq!(config.reconciliation.batch_size, 500);
    assert!(config.reconciliation.prune_stale);
    assert!(!config.reconciliation.proximity.enabled);
    assert!(config.registry.is_none());
    assert!(config.ingest.aliases.is_empty());
}

#[test]
fn test_full_toml_parses() {
    let toml = r#"
        root_folder = "/srv/sowlink"

        [logging]
        level = "debug"

        [reconciliation]
        high_confidence_threshold = 0.92
        batch_size = 100

        [reconciliation.proximity]
        enabled = true
        radius_m = 25.0
        bands = [{ under_m = 8.0, confidence = 0.85 }]

        [registry]
        base_url = "https://registry.example.com"
        api_token = "secret"

        [ingest.aliases]
        label = ["Pole Ref", "pole_number"]
    "#;

    let config = parse_toml_config(toml).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/sowlink")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.reconciliation.high_confidence_threshold, 0.92);
    assert_eq!(config.reconciliation.low_confidence_threshold, 0.7);
    assert_eq!(config.reconciliation.batch_size, 100);
    assert!(config.reconciliation.proximity.enabled);
    assert_eq!(config.reconciliation.proximity.radius_m, 25.0);
    assert_eq!(config.reconciliation.proximity.box_deg, 0.0003);
    assert_eq!(config.reconciliation.proximity.confidence_at(7.0), 0.85);
    assert_eq!(config.reconciliation.proximity.confidence_at(9.0), 0.6);

    let registry = config.registry.unwrap();
    assert_eq!(registry.base_url, "https://registry.example.com");
    assert_eq!(registry.api_token.as_deref(), Some("secret"));
    assert_eq!(registry.page_size, 500);

    assert_eq!(
        config.ingest.aliases.get("label").unwrap(),
        &vec!["Pole Ref".to_string(), "pole_number".to_string()]
    );
}

#[test]
fn test_invalid_thresholds_are_config_errors() {
    let toml = r#"
        [reconciliation]
        high_confidence_threshold = 0.5
        low_confidence_threshold = 0.8
    "#;

    assert!(matches!(parse_toml_config(toml), Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_config_error() {
    assert!(matches!(
        parse_toml_config("[reconciliation\nbatch_size = 1"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(matches!(
        load_toml_config(Some(&missing)),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[reconciliation]\nbatch_size = 42\n").unwrap();

    let config = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.reconciliation.batch_size, 42);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/from/cli")))
        .with_config(&config)
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(root, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new("test-module")
        .with_config(&config)
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(root, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_used_when_env_unset() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new("test-module")
        .with_config(&config)
        .resolve();

    assert_eq!(root, PathBuf::from("/from/toml"));
}

#[test]
fn test_initializer_creates_nested_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("a").join("b");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(init.database_path(), root.join("sowlink.db"));
    assert!(!init.database_exists());
}
