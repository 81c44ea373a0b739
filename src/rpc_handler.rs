//! RPC method handler for the markstash JSON-RPC protocol.
//!
//! `handle_method` dispatches one request to the `App`. The app lock is held
//! only long enough to reach a service; view-model operations run after it is
//! released, so a slow store call never blocks unrelated requests.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::app::App;
use crate::managers::bookmark_view_model::{BookmarkViewModel, CreateOutcome, DeleteOutcome};
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::User;

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

async fn open_view(app: &Mutex<App>) -> Result<Arc<BookmarkViewModel>, String> {
    app.lock()
        .await
        .view_model()
        .ok_or_else(|| "dashboard not open".to_string())
}

fn snapshot_json(vm: &BookmarkViewModel) -> Result<Value, String> {
    serde_json::to_value(vm.snapshot()).map_err(|e| e.to_string())
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Auth ───
        "auth.user" => {
            let auth = app.lock().await.auth();
            let user = auth.get_current_user().await.map_err(|e| e.to_string())?;
            Ok(json!({"user": user}))
        }
        "auth.sign_in" => {
            let provider = str_param(params, "provider")?;
            let redirect_to = str_param(params, "redirect_to")?;
            let auth = app.lock().await.auth();
            let url = auth
                .sign_in_with_oauth(provider, redirect_to)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"url": url}))
        }
        "auth.callback" => {
            let state = str_param(params, "state")?;
            let user = User {
                id: str_param(params, "user_id")?.to_string(),
                email: str_param(params, "email")?.to_string(),
            };
            let auth = app.lock().await.auth();
            let redirect_to = auth
                .complete_sign_in(state, user)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"redirect_to": redirect_to}))
        }
        "auth.sign_out" => {
            let mut a = app.lock().await;
            a.sign_out().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmarks.open" => {
            let vm = {
                let mut a = app.lock().await;
                a.open_dashboard().await.map_err(|e| e.to_string())?
            };
            snapshot_json(&vm)
        }
        "bookmarks.state" => {
            let vm = open_view(app).await?;
            snapshot_json(&vm)
        }
        "bookmarks.refresh" => {
            let vm = open_view(app).await?;
            vm.refresh().await.map_err(|e| e.to_string())?;
            snapshot_json(&vm)
        }
        "bookmarks.create" => {
            let title = str_param(params, "title")?;
            let url = str_param(params, "url")?;
            let vm = open_view(app).await?;
            match vm.create(title, url).await.map_err(|e| e.to_string())? {
                CreateOutcome::Created(row) => Ok(json!({"created": row})),
                CreateOutcome::Busy => Ok(json!({"busy": true})),
            }
        }
        "bookmarks.delete" => {
            let id = str_param(params, "id")?;
            let vm = open_view(app).await?;
            match vm.delete(id).await.map_err(|e| e.to_string())? {
                DeleteOutcome::Deleted => Ok(json!({"deleted": true})),
                DeleteOutcome::AlreadyPending => Ok(json!({"pending": true})),
            }
        }
        "bookmarks.dismiss_banner" => {
            let vm = open_view(app).await?;
            vm.dismiss_banner();
            Ok(json!({"ok": true}))
        }
        "bookmarks.close" => {
            app.lock().await.close_dashboard();
            Ok(json!({"ok": true}))
        }

        // ─── Settings ───
        "settings.get" => {
            let a = app.lock().await;
            serde_json::to_value(a.settings_engine.get_settings()).map_err(|e| e.to_string())
        }
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut a = app.lock().await;
            a.settings_engine
                .set_value(key, value)
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
