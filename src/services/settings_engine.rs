// markstash settings engine
// Persists `AppSettings` as pretty-printed JSON and rejects values the
// runtime cannot use before they reach disk.

use std::fs;
use std::path::Path;

use log::debug;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::AppSettings;

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform-specific config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::default_settings_path().to_string_lossy().to_string()
        });

        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// Rejects values that deserialize fine but cannot be used at runtime.
    fn validate(settings: &AppSettings) -> Result<(), SettingsError> {
        if settings.sync.request_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "sync.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        match settings.logging.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "warning" | "error" => {}
            other => {
                return Err(SettingsError::InvalidValue(format!(
                    "logging.level `{}` is not one of trace|debug|info|warn|error",
                    other
                )))
            }
        }
        if let Some(dir) = &settings.logging.directory {
            if !Path::new(dir).is_absolute() {
                return Err(SettingsError::InvalidValue(format!(
                    "logging.directory must be absolute, got `{}`",
                    dir
                )));
            }
        }
        Ok(())
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Reads the config file, falling back to defaults when it is absent.
    ///
    /// A file that does not parse or fails validation is an error and leaves
    /// the in-memory settings untouched.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = AppSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        let settings: AppSettings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Self::validate(&settings)?;

        debug!("event=settings_load module=settings status=ok path={}", self.config_path);
        self.settings = settings;
        Ok(self.settings.clone())
    }

    /// Writes the current settings, creating the config directory if needed.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Updates an individual setting by dot-notation key path and saves.
    ///
    /// # Examples
    /// - `"sync.policy"` → `"patch"` or `"refetch"`
    /// - `"sync.request_timeout_ms"` → `5000`
    /// - `"logging.level"` → `"debug"`
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        if key.is_empty() {
            return Err(SettingsError::InvalidKey("Key cannot be empty".to_string()));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;
        assign_path(&mut json_value, key, value)?;

        let new_settings: AppSettings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        Self::validate(&new_settings)?;

        self.settings = new_settings;
        self.save()?;

        Ok(())
    }

    /// Resets all settings to factory defaults and saves to disk.
    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}

/// Writes `value` at the dot-separated `key` inside `root`.
///
/// Only existing keys can be assigned; every segment before the last must
/// name an object.
fn assign_path(
    root: &mut serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> Result<(), SettingsError> {
    let not_found = || SettingsError::InvalidKey(format!("Key '{}' not found in settings", key));

    let segments: Vec<&str> = key.split('.').collect();
    let (leaf, parents) = segments.split_last().ok_or_else(not_found)?;

    let mut node = root;
    for segment in parents {
        node = node.get_mut(*segment).ok_or_else(not_found)?;
    }
    let map = node.as_object_mut().ok_or_else(|| {
        SettingsError::InvalidKey(format!(
            "Cannot navigate to key '{}': intermediate value is not an object",
            key
        ))
    })?;
    match map.get_mut(*leaf) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(not_found()),
    }
}
