//! App Core for markstash.
//!
//! Builds the database, bookmark store and auth service once per process and
//! injects them into the bookmark view-model, which lives while the user has
//! the dashboard open.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::database::connection::Database;
use crate::managers::bookmark_store::{BookmarkStore, SqliteBookmarkStore};
use crate::managers::bookmark_view_model::{BookmarkViewModel, ViewModelOptions};
use crate::services::auth_service::{AuthService, LocalAuthService};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::bookmark::User;
use crate::types::errors::AuthError;

/// Central application struct holding the store, auth and settings.
pub struct App {
    pub db: Arc<Database>,
    pub settings_engine: SettingsEngine,
    store: Arc<SqliteBookmarkStore>,
    auth: Arc<dyn AuthService>,
    view_model: Option<Arc<BookmarkViewModel>>,
}

impl App {
    /// Opens the database at `db_path` and wires the services.
    ///
    /// `settings_engine` should already be loaded; its auth section is read
    /// once here, its sync section each time the dashboard opens.
    pub fn new(db_path: &str, settings_engine: SettingsEngine) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Arc::new(Database::open(db_path)?);
        let store = Arc::new(SqliteBookmarkStore::new(db.clone())?);
        let auth: Arc<dyn AuthService> = Arc::new(LocalAuthService::new(
            db.clone(),
            settings_engine.get_settings().auth.clone(),
        ));

        info!("event=app_init module=app status=ok db_path={}", db_path);
        Ok(Self {
            db,
            settings_engine,
            store,
            auth,
            view_model: None,
        })
    }

    pub fn store(&self) -> Arc<SqliteBookmarkStore> {
        self.store.clone()
    }

    pub fn auth(&self) -> Arc<dyn AuthService> {
        self.auth.clone()
    }

    /// The open dashboard's view-model, if any.
    pub fn view_model(&self) -> Option<Arc<BookmarkViewModel>> {
        self.view_model.clone()
    }

    pub async fn current_user(&self) -> Result<Option<User>, AuthError> {
        self.auth.get_current_user().await
    }

    /// Opens the dashboard for the signed-in user.
    ///
    /// Seeds the view-model with a first-paint listing, then refreshes once
    /// the subscription is live so nothing inserted in between is missed.
    /// Reuses the open view-model when it already belongs to this user.
    pub async fn open_dashboard(&mut self) -> Result<Arc<BookmarkViewModel>, AuthError> {
        let user = self
            .auth
            .get_current_user()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        if let Some(vm) = &self.view_model {
            if !vm.is_closed() && vm.user_id() == user.id {
                return Ok(vm.clone());
            }
        }
        self.close_dashboard();

        let options = ViewModelOptions::from(&self.settings_engine.get_settings().sync);
        let first_paint =
            tokio::time::timeout(options.request_timeout, self.store.list_bookmarks(&user.id)).await;
        let seed = match first_paint {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                warn!("event=first_paint module=app status=error reason={}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("event=first_paint module=app status=timeout");
                Vec::new()
            }
        };

        let store: Arc<dyn BookmarkStore> = self.store.clone();
        let vm = Arc::new(BookmarkViewModel::initialize(store, &user.id, seed, options).await);
        let _ = vm.refresh().await;

        self.view_model = Some(vm.clone());
        Ok(vm)
    }

    /// Tears down the dashboard's view-model and its subscription.
    pub fn close_dashboard(&mut self) {
        if let Some(vm) = self.view_model.take() {
            vm.close();
        }
    }

    /// Closes the dashboard, then ends the session.
    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        self.close_dashboard();
        self.auth.sign_out().await
    }
}
