use serde::{Deserialize, Serialize};

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppSettings {
    pub store: StoreSettings,
    pub sync: SyncSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// Where bookmark rows are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StoreSettings {
    /// SQLite file path. `None` means the platform data directory.
    pub database_path: Option<String>,
}

/// How the bookmark view reacts to change notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Merge insert/delete payloads into the local list.
    Patch,
    /// Ignore payloads and refetch the full list on every change.
    #[default]
    Refetch,
}

/// Real-time sync and request settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    pub policy: ReconcilePolicy,
    pub request_timeout_ms: u64,
    pub resubscribe_attempts: u32,
    pub resubscribe_backoff_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            policy: ReconcilePolicy::Refetch,
            request_timeout_ms: 10_000,
            resubscribe_attempts: 3,
            resubscribe_backoff_ms: 500,
        }
    }
}

/// OAuth sign-in settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    pub providers: Vec<OAuthProvider>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            providers: vec![OAuthProvider {
                name: "google".to_string(),
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                client_id: String::new(),
            }],
        }
    }
}

/// A configured OAuth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthProvider {
    pub name: String,
    pub authorize_url: String,
    pub client_id: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    /// Absolute directory for rotating log files. `None` logs to stderr.
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
