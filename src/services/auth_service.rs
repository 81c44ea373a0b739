//! Auth session handling for markstash.
//!
//! `AuthService` is the sign-in capability the app consumes. The local
//! implementation starts an OAuth redirect (authorization URL plus a one-time
//! `state`), accepts the callback for that `state`, and persists the signed-in
//! user in SQLite. Exchanging the authorization code with the provider is the
//! callback layer's job and happens before `complete_sign_in` is called.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, info};
use rusqlite::params;
use url::Url;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::types::bookmark::User;
use crate::types::errors::AuthError;
use crate::types::settings::AuthSettings;

/// Seconds an unanswered sign-in `state` stays valid.
pub const PENDING_STATE_TTL_SECS: i64 = 10 * 60;

/// Sign-in and session operations.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the signed-in user, if any.
    async fn get_current_user(&self) -> Result<Option<User>, AuthError>;
    /// Starts an OAuth sign-in and returns the provider URL to redirect to.
    async fn sign_in_with_oauth(&self, provider: &str, redirect_target: &str) -> Result<String, AuthError>;
    /// Finishes a sign-in started with `state`; returns the original redirect target.
    async fn complete_sign_in(&self, state: &str, user: User) -> Result<String, AuthError>;
    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Auth service backed by SQLite and the configured provider list.
pub struct LocalAuthService {
    db: Arc<Database>,
    settings: AuthSettings,
}

impl LocalAuthService {
    pub fn new(db: Arc<Database>, settings: AuthSettings) -> Self {
        Self { db, settings }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Drops pending sign-ins older than [`PENDING_STATE_TTL_SECS`].
    fn purge_expired(conn: &rusqlite::Connection) -> Result<usize, AuthError> {
        let removed = conn
            .execute(
                "DELETE FROM oauth_pending WHERE created_at < ?1",
                params![Self::now() - PENDING_STATE_TTL_SECS],
            )
            .map_err(|e| AuthError::Database(e.to_string()))?;
        if removed > 0 {
            debug!("event=oauth_pending_purge module=auth status=ok removed={}", removed);
        }
        Ok(removed)
    }

    /// Accepts only absolute http(s) URLs with a host.
    fn validate_redirect(target: &str) -> Result<Url, AuthError> {
        let url = Url::parse(target).map_err(|_| AuthError::InvalidRedirect(target.to_string()))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(AuthError::InvalidRedirect(target.to_string())),
        }
    }
}

#[async_trait]
impl AuthService for LocalAuthService {
    async fn get_current_user(&self) -> Result<Option<User>, AuthError> {
        let conn = self.db.connection();
        let result = conn.query_row(
            "SELECT user_id, email FROM auth_session WHERE id = 'default'",
            [],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                })
            },
        );

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AuthError::Database(e.to_string())),
        }
    }

    async fn sign_in_with_oauth(&self, provider: &str, redirect_target: &str) -> Result<String, AuthError> {
        let config = self
            .settings
            .providers
            .iter()
            .find(|p| p.name == provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.to_string()))?;
        let redirect = Self::validate_redirect(redirect_target)?;

        let mut authorize = Url::parse(&config.authorize_url)
            .map_err(|_| AuthError::UnsupportedProvider(provider.to_string()))?;
        let state = Uuid::new_v4().to_string();
        authorize
            .query_pairs_mut()
            .append_pair("client_id", &config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect.as_str())
            .append_pair("state", &state);

        let conn = self.db.connection();
        Self::purge_expired(&conn)?;
        conn.execute(
            "INSERT INTO oauth_pending (state, provider, redirect_target, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![state, provider, redirect.as_str(), Self::now()],
        )
        .map_err(|e| AuthError::Database(e.to_string()))?;

        info!("event=sign_in_start module=auth status=ok provider={}", provider);
        Ok(authorize.to_string())
    }

    async fn complete_sign_in(&self, state: &str, user: User) -> Result<String, AuthError> {
        let conn = self.db.connection();
        Self::purge_expired(&conn)?;

        // Consuming the state and writing the session succeed or fail together.
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| AuthError::Database(e.to_string()))?;
        let pending = tx.query_row(
            "SELECT provider, redirect_target FROM oauth_pending WHERE state = ?1",
            params![state],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );

        let (provider, redirect_target) = match pending {
            Ok(found) => found,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(AuthError::StateMismatch),
            Err(e) => return Err(AuthError::Database(e.to_string())),
        };

        tx.execute("DELETE FROM oauth_pending WHERE state = ?1", params![state])
            .map_err(|e| AuthError::Database(e.to_string()))?;
        tx.execute(
            "INSERT OR REPLACE INTO auth_session (id, user_id, email, provider, updated_at) VALUES ('default', ?1, ?2, ?3, ?4)",
            params![user.id, user.email, provider, Self::now()],
        )
        .map_err(|e| AuthError::Database(e.to_string()))?;
        tx.commit().map_err(|e| AuthError::Database(e.to_string()))?;

        info!("event=sign_in_complete module=auth status=ok provider={}", provider);
        Ok(redirect_target)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.db
            .connection()
            .execute("DELETE FROM auth_session", [])
            .map_err(|e| AuthError::Database(e.to_string()))?;
        info!("event=sign_out module=auth status=ok");
        Ok(())
    }
}
