//! markstash RPC Server — JSON-RPC over stdin/stdout for a UI shell.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmarks.create", "params":{"title":"...","url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Push:     {"event":"bookmarks.changed", "state":{...}} whenever the open dashboard changes.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use markstash::app::App;
use markstash::logging;
use markstash::managers::bookmark_view_model::BookmarkViewModel;
use markstash::platform;
use markstash::rpc_handler::handle_method;
use markstash::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

/// Simple rate limiter: max requests per second.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

/// Pushes a `bookmarks.changed` event for every revision of the open dashboard.
struct ChangeForwarder {
    current: std::sync::Mutex<Option<Weak<BookmarkViewModel>>>,
    out: mpsc::UnboundedSender<Value>,
}

impl ChangeForwarder {
    fn ensure(&self, vm: &Arc<BookmarkViewModel>) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = current.as_ref().and_then(Weak::upgrade) {
            if Arc::ptr_eq(&existing, vm) {
                return;
            }
        }
        *current = Some(Arc::downgrade(vm));

        let weak = Arc::downgrade(vm);
        let mut revisions = vm.watch();
        let out = self.out.clone();
        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                let Some(vm) = weak.upgrade() else { break };
                let snapshot = vm.snapshot();
                let closed = snapshot.closed;
                if out.send(json!({"event": "bookmarks.changed", "state": snapshot})).is_err() || closed {
                    break;
                }
            }
        });
    }
}

fn database_path(configured: Option<&str>) -> PathBuf {
    if let Ok(dir) = std::env::var("MARKSTASH_DATA_DIR") {
        return PathBuf::from(dir).join("markstash.db");
    }
    match configured {
        Some(path) => PathBuf::from(path),
        None => platform::default_database_path(),
    }
}

#[tokio::main]
async fn main() {
    let mut settings_engine = SettingsEngine::new(std::env::var("MARKSTASH_CONFIG").ok());
    let settings_load = settings_engine.load();
    let settings = settings_engine.get_settings().clone();

    if let Err(e) = logging::init_logging(&settings.logging.level, settings.logging.directory.as_deref()) {
        eprintln!("markstash: logging disabled: {}", e);
    }
    if let Err(e) = settings_load {
        warn!("event=settings_load module=rpc status=error reason={} action=defaults", e);
    }

    let db_path = database_path(settings.store.database_path.as_deref());
    let app = match App::new(&db_path.to_string_lossy(), settings_engine) {
        Ok(app) => Arc::new(Mutex::new(app)),
        Err(e) => {
            error!("event=app_init module=rpc status=error reason={}", e);
            println!("{}", json!({"event": "error", "error": e.to_string()}));
            std::process::exit(1);
        }
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let line = format!("{}\n", message);
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });
    let forwarder = Arc::new(ChangeForwarder {
        current: std::sync::Mutex::new(None),
        out: out_tx.clone(),
    });

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    info!("event=rpc_ready module=rpc status=ok");

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);
        if !rate_limiter.check() {
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));
        let app = app.clone();
        let out = out_tx.clone();
        let forwarder = forwarder.clone();

        tokio::spawn(async move {
            let result = handle_method(&app, &method, &params).await;
            if method == "bookmarks.open" && result.is_ok() {
                if let Some(vm) = app.lock().await.view_model() {
                    forwarder.ensure(&vm);
                }
            }
            let response = match result {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => json!({"id": id, "error": err}),
            };
            let _ = out.send(response);
        });
    }

    info!("event=rpc_shutdown module=rpc status=ok");
    app.lock().await.close_dashboard();
    drop(out_tx);
    drop(forwarder);
    let _ = tokio::time::timeout(Duration::from_secs(2), writer).await;
}
