use std::fmt;

// === ValidationError ===

/// Errors raised when user input is rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The title was empty after trimming whitespace.
    EmptyTitle,
    /// The URL was empty after trimming whitespace.
    EmptyUrl,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "Title is required"),
            ValidationError::EmptyUrl => write!(f, "URL is required"),
        }
    }
}

impl std::error::Error for ValidationError {}

// === StoreError ===

/// Errors reported by the bookmark store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database operation failed.
    Database(String),
    /// The request did not complete within the configured timeout.
    Timeout(String),
    /// The change-notification transport is gone.
    SubscriptionClosed,
    /// The caller is not allowed to perform the operation.
    Unauthorized(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Bookmark store error: {}", msg),
            StoreError::Timeout(op) => write!(f, "Bookmark store request timed out: {}", op),
            StoreError::SubscriptionClosed => write!(f, "Change subscription closed"),
            StoreError::Unauthorized(msg) => write!(f, "Not authorized: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === AuthError ===

/// Errors related to sign-in and session handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The requested OAuth provider is not configured.
    UnsupportedProvider(String),
    /// The post-sign-in redirect target is not an absolute http(s) URL.
    InvalidRedirect(String),
    /// The callback `state` does not match a pending sign-in.
    StateMismatch,
    /// No user is signed in.
    NotAuthenticated,
    /// Database operation failed.
    Database(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UnsupportedProvider(p) => write!(f, "Unsupported OAuth provider: {}", p),
            AuthError::InvalidRedirect(url) => write!(f, "Invalid redirect target: {}", url),
            AuthError::StateMismatch => write!(f, "OAuth state mismatch"),
            AuthError::NotAuthenticated => write!(f, "Not signed in"),
            AuthError::Database(msg) => write!(f, "Auth database error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

// === ViewModelError ===

/// Errors returned by bookmark view-model operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewModelError {
    /// Input was rejected before any request was issued.
    Validation(ValidationError),
    /// The store rejected or failed the request.
    Store(StoreError),
    /// The view-model has been torn down.
    Closed,
}

impl fmt::Display for ViewModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewModelError::Validation(e) => write!(f, "{}", e),
            ViewModelError::Store(e) => write!(f, "{}", e),
            ViewModelError::Closed => write!(f, "Bookmark view is closed"),
        }
    }
}

impl std::error::Error for ViewModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewModelError::Validation(e) => Some(e),
            ViewModelError::Store(e) => Some(e),
            ViewModelError::Closed => None,
        }
    }
}

impl From<ValidationError> for ViewModelError {
    fn from(e: ValidationError) -> Self {
        ViewModelError::Validation(e)
    }
}

impl From<StoreError> for ViewModelError {
    fn from(e: StoreError) -> Self {
        ViewModelError::Store(e)
    }
}
