//! Property tests for settings persistence.

use proptest::prelude::*;
use tempfile::TempDir;

use markstash::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use markstash::types::settings::{AppSettings, ReconcilePolicy};

fn policy_strategy() -> impl Strategy<Value = ReconcilePolicy> {
    prop_oneof![Just(ReconcilePolicy::Patch), Just(ReconcilePolicy::Refetch)]
}

fn level_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["trace", "debug", "info", "warn", "error"]).prop_map(String::from)
}

fn settings_strategy() -> impl Strategy<Value = AppSettings> {
    (
        policy_strategy(),
        1u64..120_000,
        0u32..10,
        0u64..10_000,
        level_strategy(),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(policy, timeout, attempts, backoff, level, db_name)| {
            let mut settings = AppSettings::default();
            settings.sync.policy = policy;
            settings.sync.request_timeout_ms = timeout;
            settings.sync.resubscribe_attempts = attempts;
            settings.sync.resubscribe_backoff_ms = backoff;
            settings.logging.level = level;
            settings.store.database_path = db_name.map(|n| format!("/var/lib/markstash/{}.db", n));
            settings
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_saved_settings_load_back_unchanged(settings in settings_strategy()) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();

        let mut engine = SettingsEngine::new(Some(path.clone()));
        prop_assert_eq!(engine.load().unwrap(), settings.clone());

        engine.save().unwrap();
        let mut reloaded = SettingsEngine::new(Some(path));
        prop_assert_eq!(reloaded.load().unwrap(), settings);
    }

    #[test]
    fn prop_set_value_persists_sync_fields(
        timeout in 1u64..120_000,
        attempts in 0u32..10,
        policy in policy_strategy(),
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();
        let mut engine = SettingsEngine::new(Some(path.clone()));
        engine.load().unwrap();

        engine.set_value("sync.request_timeout_ms", serde_json::json!(timeout)).unwrap();
        engine.set_value("sync.resubscribe_attempts", serde_json::json!(attempts)).unwrap();
        engine.set_value("sync.policy", serde_json::to_value(policy).unwrap()).unwrap();

        let mut reloaded = SettingsEngine::new(Some(path));
        let sync = reloaded.load().unwrap().sync;
        prop_assert_eq!(sync.request_timeout_ms, timeout);
        prop_assert_eq!(sync.resubscribe_attempts, attempts);
        prop_assert_eq!(sync.policy, policy);
    }
}
