/// Layered JSON configuration tests
///
/// Tests touching NETFX_ENVIRONMENT run serially; the rest use their own
/// variable names so they never see each other's process state.

use proptest::prelude::*;
use serde::Deserialize;
use serial_test::serial;
use shaper::config::{
    flatten_json, ConfigError, Configuration, ConfigurationExt, ConfigurationOptions, JsonConfiguration,
    DEFAULT_ENVIRONMENT_VARIABLE,
};
use shaper::{Resolver, ServiceCollection};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("Failed to write settings file");
}

fn settings_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    write(
        dir.path(),
        "appsettings.json",
        r#"{
            "A": { "B": 1 },
            "C": [1, 2],
            "AppSettings": { "SiteName": "Shop", "Debug": false },
            "ConnectionStrings": { "DefaultConnection": "Server=base" }
        }"#,
    );
    write(
        dir.path(),
        "appsettings.Staging.json",
        r#"{
            "A": { "B": 2 },
            "AppSettings": { "Debug": true },
            "ConnectionStrings": { "DefaultConnection": "Server=staging" }
        }"#,
    );
    dir
}

#[test]
fn test_base_file_is_flattened() {
    let dir = settings_dir();
    let options = ConfigurationOptions::new(dir.path()).environment_variable("SHAPER_TEST_UNSET_ENV");
    let config = JsonConfiguration::load_with(options).unwrap();

    assert_eq!(config.environment(), "Development");
    assert_eq!(config.get_str("A:B"), Some("1"));
    assert_eq!(config.get_str("C"), Some("[1,2]"));
    assert_eq!(config.get_str("AppSettings:SiteName"), Some("Shop"));
    assert_eq!(config.get_value::<i32>("A:B"), 1);
    assert_eq!(config.get_value::<Vec<u8>>("C"), vec![1, 2]);
    assert!(!config.get_value::<bool>("AppSettings:Debug"));
    assert_eq!(config.base_path(), Some(dir.path()));
}

#[test]
fn test_environment_file_overrides_base() {
    let dir = settings_dir();
    let options = ConfigurationOptions::new(dir.path())
        .environment_variable("SHAPER_TEST_UNSET_ENV")
        .fallback_environment("Staging");
    let config = JsonConfiguration::load_with(options).unwrap();

    assert_eq!(config.environment(), "Staging");
    assert_eq!(config.get_str("A:B"), Some("2"));
    assert_eq!(config.get_str("C"), Some("[1,2]"));
    assert!(config.get_value::<bool>("AppSettings:Debug"));
    // Keys only in the base file survive
    assert_eq!(config.get_str("AppSettings:SiteName"), Some("Shop"));
    assert_eq!(config.get_connection_string("DefaultConnection"), Some("Server=staging"));
}

#[test]
#[serial]
fn test_process_variable_selects_environment() {
    let dir = settings_dir();
    assert_eq!(DEFAULT_ENVIRONMENT_VARIABLE, "NETFX_ENVIRONMENT");
    std::env::set_var("NETFX_ENVIRONMENT", "Staging");
    let config = JsonConfiguration::load(dir.path());
    std::env::remove_var("NETFX_ENVIRONMENT");

    let config = config.unwrap();
    assert_eq!(config.environment(), "Staging");
    assert_eq!(config.get_connection_string("DefaultConnection"), Some("Server=staging"));
}

#[test]
#[serial]
fn test_empty_process_variable_falls_through() {
    let dir = settings_dir();
    std::env::set_var(DEFAULT_ENVIRONMENT_VARIABLE, "");
    let config = JsonConfiguration::load_with(
        ConfigurationOptions::new(dir.path()).fallback_environment("Staging"),
    );
    std::env::remove_var(DEFAULT_ENVIRONMENT_VARIABLE);

    assert_eq!(config.unwrap().environment(), "Staging");
}

#[test]
#[serial]
fn test_process_variable_beats_fallback() {
    let dir = settings_dir();
    std::env::set_var(DEFAULT_ENVIRONMENT_VARIABLE, "Production");
    let config = JsonConfiguration::load_with(
        ConfigurationOptions::new(dir.path()).fallback_environment("Staging"),
    );
    std::env::remove_var(DEFAULT_ENVIRONMENT_VARIABLE);

    let config = config.unwrap();
    // No appsettings.Production.json: base values only
    assert_eq!(config.environment(), "Production");
    assert_eq!(config.get_str("A:B"), Some("1"));
    assert_eq!(config.get_connection_string("DefaultConnection"), Some("Server=base"));
}

#[test]
fn test_missing_base_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    match JsonConfiguration::load(&missing) {
        Err(ConfigError::BaseDirectoryNotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected missing directory error, got {:?}", other),
    }
}

#[test]
fn test_missing_and_malformed_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "appsettings.json", "{ not json");
    write(dir.path(), "appsettings.Broken.json", "[1, 2, 3]");

    let options = ConfigurationOptions::new(dir.path())
        .environment_variable("SHAPER_TEST_UNSET_ENV")
        .default_environment("Broken");
    let config = JsonConfiguration::load_with(options).unwrap();

    assert_eq!(config.environment(), "Broken");
    assert!(config.settings().is_empty());

    let empty = TempDir::new().unwrap();
    let config = JsonConfiguration::load_with(
        ConfigurationOptions::new(empty.path()).environment_variable("SHAPER_TEST_UNSET_ENV"),
    )
    .unwrap();
    assert!(config.settings().is_empty());
}

#[derive(Debug, Default, PartialEq, Deserialize)]
struct RetrySettings {
    attempts: u32,
    delay_ms: u64,
}

#[test]
fn test_typed_reads() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "appsettings.json",
        r#"{
            "Retry": { "Policy": "{\"attempts\":4,\"delay_ms\":250}" },
            "Port": "8080",
            "Ratio": 0.5,
            "Nothing": null
        }"#,
    );
    let config = JsonConfiguration::load_with(
        ConfigurationOptions::new(dir.path()).environment_variable("SHAPER_TEST_UNSET_ENV"),
    )
    .unwrap();

    assert_eq!(
        config.get_value::<RetrySettings>("Retry:Policy"),
        RetrySettings {
            attempts: 4,
            delay_ms: 250
        }
    );
    assert_eq!(config.get_value::<u16>("Port"), 8080);
    assert_eq!(config.get_value::<f32>("Ratio"), 0.5);
    assert_eq!(config.get_value::<Option<u32>>("Nothing"), None);
    assert_eq!(config.get_value::<String>("Missing"), "");
    assert_eq!(config.try_get_value::<u16>("Missing"), None);
}

#[test]
fn test_configuration_as_trait_service() {
    let dir = settings_dir();
    let config = JsonConfiguration::load_with(
        ConfigurationOptions::new(dir.path()).environment_variable("SHAPER_TEST_UNSET_ENV"),
    )
    .unwrap();

    let mut services = ServiceCollection::new();
    services.add_singleton_trait::<dyn Configuration>(Arc::new(config));

    let provider = services.build();
    let scope = provider.create_scope();
    let resolved = scope.get_required_trait::<dyn Configuration>().unwrap();

    assert_eq!(resolved.get_value::<i32>("A:B"), 1);
    assert_eq!(resolved.get_connection_string("DefaultConnection"), Some("Server=base"));
}

proptest! {
    #[test]
    fn nested_keys_join_with_colons(
        outer in "[A-Za-z]{1,8}",
        inner in "[A-Za-z]{1,8}",
        value in any::<i64>(),
    ) {
        let mut nested = serde_json::Map::new();
        nested.insert(inner.clone(), serde_json::Value::from(value));
        let mut root = serde_json::Map::new();
        root.insert(outer.clone(), serde_json::Value::Object(nested));

        let flat = flatten_json(&root);
        prop_assert_eq!(flat.len(), 1);
        prop_assert_eq!(flat.get(&format!("{}:{}", outer, inner)), Some(&value.to_string()));
    }

    #[test]
    fn strings_are_stored_unquoted(key in "[a-z]{1,10}", text in "[ -~]{0,20}") {
        let mut root = serde_json::Map::new();
        root.insert(key.clone(), serde_json::Value::String(text.clone()));

        let flat = flatten_json(&root);
        prop_assert_eq!(flat.get(&key), Some(&text));
    }
}
