//! Configuration loading and root folder resolution
//!
//! Tests that manipulate LIBRIS_ROOT_FOLDER / LIBRIS_CONFIG are marked #[serial]
//! so they never race on the process environment.

use libris_common::config::{
    locate_config_file, resolve_root_folder, write_toml_config, TomlConfig, CONFIG_FILE_ENV,
    ROOT_FOLDER_ENV,
};
use libris_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/libris-env-root");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/libris-toml-root")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/libris-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/libris-toml-root")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &config);
    assert_eq!(resolved, PathBuf::from("/tmp/libris-toml-root"));
}

#[test]
#[serial]
fn test_compiled_default_is_non_empty() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_config_env_points_at_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[logging]\nlevel = \"debug\"\n\n[resolver]\npredictor_threshold = 0.65\n",
    )
    .unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    assert_eq!(locate_config_file(), Some(path.clone()));
    let config = TomlConfig::load_or_default();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.resolver.predictor_threshold, 0.65);

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let config = TomlConfig::load_or_default();
    assert_eq!(config.resolver.folder_depth, 4);

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_malformed_config_is_reported_for_deferred_logging() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[resolver]\nfolder_depth = \"deep\"\n").unwrap();
    env::set_var(CONFIG_FILE_ENV, &path);

    let (config, ignored) = TomlConfig::load_located();
    assert_eq!(config.resolver.folder_depth, 4);
    let (ignored_path, err) = ignored.expect("malformed file must be reported");
    assert_eq!(ignored_path, path);
    assert!(matches!(err, Error::Config(_)));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_load_rejects_invalid_ranges() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[resolver]\nfolder_depth = 0\n").unwrap();

    assert!(matches!(TomlConfig::load(&path), Err(Error::Config(_))));
}

#[test]
fn test_write_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/srv/library"));
    config.resolver.model_path = Some(PathBuf::from("/srv/library/model.json"));
    write_toml_config(&config, &path).unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/library")));
    assert_eq!(
        loaded.resolver.model_path,
        Some(PathBuf::from("/srv/library/model.json"))
    );
    assert!(!path.with_extension("toml.tmp").exists());
}
