// markstash platform paths
// Each target supplies `get_config_dir` and `get_data_dir`; the matching
// module is picked at compile time and re-exported here.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::{get_config_dir, get_data_dir};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{get_config_dir, get_data_dir};

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use windows::{get_config_dir, get_data_dir};

/// Settings file used when `MARKSTASH_CONFIG` is not set.
pub fn default_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

/// Bookmark database used when neither the environment nor settings name one.
pub fn default_database_path() -> PathBuf {
    get_data_dir().join("markstash.db")
}
