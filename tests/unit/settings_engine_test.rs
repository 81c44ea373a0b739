//! Unit tests for the settings engine.

use rstest::rstest;
use tempfile::TempDir;

use markstash::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use markstash::types::errors::SettingsError;
use markstash::types::settings::{AppSettings, ReconcilePolicy};

fn setup() -> (SettingsEngine, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("settings.json").to_string_lossy().to_string();
    (SettingsEngine::new(Some(path)), dir)
}

#[test]
fn test_load_missing_file_returns_defaults() {
    let (mut engine, _dir) = setup();
    let settings = engine.load().unwrap();
    assert_eq!(settings, AppSettings::default());
    assert_eq!(settings.sync.policy, ReconcilePolicy::Refetch);
    assert_eq!(settings.sync.request_timeout_ms, 10_000);
    assert_eq!(settings.sync.resubscribe_attempts, 3);
    assert_eq!(settings.logging.level, "info");
    assert!(settings.store.database_path.is_none());
}

#[test]
fn test_save_then_load_preserves_changes() {
    let (mut engine, dir) = setup();
    engine.load().unwrap();
    engine.set_value("sync.policy", serde_json::json!("patch")).unwrap();
    engine
        .set_value("sync.resubscribe_backoff_ms", serde_json::json!(250))
        .unwrap();

    let path = dir.path().join("settings.json").to_string_lossy().to_string();
    let mut reloaded = SettingsEngine::new(Some(path));
    let settings = reloaded.load().unwrap();
    assert_eq!(settings.sync.policy, ReconcilePolicy::Patch);
    assert_eq!(settings.sync.resubscribe_backoff_ms, 250);
}

#[test]
fn test_load_malformed_file_is_serialization_error() {
    let (mut engine, _dir) = setup();
    std::fs::write(engine.get_config_path(), "{ not json").unwrap();
    assert!(matches!(engine.load(), Err(SettingsError::SerializationError(_))));
}

#[test]
fn test_load_rejects_invalid_values_on_disk() {
    let (mut engine, _dir) = setup();
    let mut settings = AppSettings::default();
    settings.sync.request_timeout_ms = 0;
    std::fs::write(
        engine.get_config_path(),
        serde_json::to_string(&settings).unwrap(),
    )
    .unwrap();

    assert!(matches!(engine.load(), Err(SettingsError::InvalidValue(_))));
}

#[test]
fn test_logging_directory_may_be_omitted_on_disk() {
    let (mut engine, _dir) = setup();
    let mut value = serde_json::to_value(AppSettings::default()).unwrap();
    value["logging"].as_object_mut().unwrap().remove("directory");
    std::fs::write(engine.get_config_path(), value.to_string()).unwrap();

    assert!(engine.load().unwrap().logging.directory.is_none());
}

#[rstest]
#[case("")]
#[case("sync.nonexistent")]
#[case("nothing.here")]
#[case("sync.policy.deeper")]
fn test_set_value_rejects_bad_keys(#[case] key: &str) {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    let result = engine.set_value(key, serde_json::json!("patch"));
    assert!(matches!(result, Err(SettingsError::InvalidKey(_))), "key {:?}", key);
}

#[rstest]
#[case("sync.policy", serde_json::json!("sometimes"))]
#[case("sync.request_timeout_ms", serde_json::json!("fast"))]
#[case("sync.request_timeout_ms", serde_json::json!(0))]
#[case("logging.level", serde_json::json!("loud"))]
#[case("logging.directory", serde_json::json!("relative/logs"))]
fn test_set_value_rejects_bad_values(#[case] key: &str, #[case] value: serde_json::Value) {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    let before = engine.get_settings().clone();

    let result = engine.set_value(key, value);
    assert!(matches!(result, Err(SettingsError::InvalidValue(_))), "key {:?}", key);
    assert_eq!(engine.get_settings(), &before);
}

#[test]
fn test_set_database_path() {
    let (mut engine, dir) = setup();
    engine.load().unwrap();
    let db_path = dir.path().join("bookmarks.db").to_string_lossy().to_string();

    engine
        .set_value("store.database_path", serde_json::json!(db_path))
        .unwrap();
    assert_eq!(engine.get_settings().store.database_path.as_deref(), Some(db_path.as_str()));
}

#[test]
fn test_reset_restores_defaults_on_disk() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    engine.set_value("sync.policy", serde_json::json!("patch")).unwrap();

    engine.reset().unwrap();
    assert_eq!(engine.get_settings(), &AppSettings::default());
    assert_eq!(engine.load().unwrap(), AppSettings::default());
}
