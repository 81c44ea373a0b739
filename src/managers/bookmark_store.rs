//! Bookmark store for markstash.
//!
//! Defines the `BookmarkStore` capability the view-model talks to, the
//! change-notification feed every store publishes into, and
//! `SqliteBookmarkStore`, a local implementation backed by `rusqlite`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::params;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::database::connection::Database;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::change::{ChangeEvent, ChangeScope};
use crate::types::errors::StoreError;

/// Buffered notifications per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// Data and notification operations consumed from the bookmark store.
///
/// Ownership is enforced here, not by callers: listing returns only the
/// given user's rows and deleting a row the user does not own is a no-op.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Lists a user's bookmarks, newest first.
    async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError>;
    /// Inserts a bookmark and returns the stored row.
    async fn insert_bookmark(&self, new: NewBookmark) -> Result<Bookmark, StoreError>;
    /// Deletes a bookmark by id. Succeeds without effect if the row is missing or not owned.
    async fn delete_bookmark(&self, user_id: &str, id: &str) -> Result<(), StoreError>;
    /// Opens a live subscription to row changes.
    async fn subscribe_to_changes(&self, scope: ChangeScope) -> Result<ChangeSubscription, StoreError>;
}

/// One item read from a [`ChangeSubscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(ChangeEvent),
    /// The subscriber fell behind and this many notifications were dropped.
    Missed(u64),
}

/// A cancelable stream of change notifications filtered by scope.
pub struct ChangeSubscription {
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    scope: ChangeScope,
}

impl ChangeSubscription {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>, scope: ChangeScope) -> Self {
        Self {
            receiver: Some(receiver),
            scope,
        }
    }

    /// Waits for the next delivery in scope.
    ///
    /// Returns `None` once the subscription is closed or the feed has shut down.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(event) => {
                    if self.scope.admits(&event) {
                        return Some(Delivery::Event(event));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(Delivery::Missed(missed));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    /// Stops delivery. Subsequent calls to [`next`](Self::next) return `None`.
    pub fn close(&mut self) {
        self.receiver = None;
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn scope(&self) -> &ChangeScope {
        &self.scope
    }
}

/// Fan-out of change notifications to every open subscription.
///
/// The transport can be shut down and reopened, which ends all live
/// subscriptions the same way a dropped connection would.
pub struct ChangeFeed {
    sender: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Publishes an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let guard = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            // No receivers is not an error; nobody is listening right now.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, scope: ChangeScope) -> Result<ChangeSubscription, StoreError> {
        let guard = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        match guard.as_ref() {
            Some(sender) => Ok(ChangeSubscription::new(sender.subscribe(), scope)),
            None => Err(StoreError::SubscriptionClosed),
        }
    }

    /// Drops the transport; every live subscription ends.
    pub fn shutdown(&self) {
        let mut guard = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    /// Brings the transport back after a [`shutdown`](Self::shutdown).
    pub fn reopen(&self) {
        let mut guard = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            let (sender, _) = broadcast::channel(FEED_CAPACITY);
            *guard = Some(sender);
        }
    }

    pub fn is_open(&self) -> bool {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).is_some()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookmark store backed by a SQLite database.
pub struct SqliteBookmarkStore {
    db: Arc<Database>,
    feed: ChangeFeed,
    last_created_at: AtomicI64,
}

impl SqliteBookmarkStore {
    /// Creates a store over the given database.
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        let last: i64 = db
            .connection()
            .query_row("SELECT COALESCE(MAX(created_at), 0) FROM bookmarks", [], |row| {
                row.get(0)
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db,
            feed: ChangeFeed::new(),
            last_created_at: AtomicI64::new(last),
        })
    }

    /// The notification feed this store publishes into.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Returns a strictly increasing insertion timestamp in milliseconds,
    /// so newest-first order is total even for inserts within one millisecond.
    fn next_created_at(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let mut prev = self.last_created_at.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self.last_created_at.compare_exchange(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Runs a statement on the blocking pool so a caller's timeout can fire
    /// while the connection lock or SQLite's busy wait is held up.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::Database(format!("store task failed: {}", e)))?
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl BookmarkStore for SqliteBookmarkStore {
    async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let user_id = user_id.to_string();
        self.run_blocking(move |db| {
            let conn = db.connection();
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, url, created_at FROM bookmarks \
                     WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;

            let rows = stmt
                .query_map(params![user_id], Self::row_to_bookmark)
                .map_err(|e| StoreError::Database(e.to_string()))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
            }
            Ok(results)
        })
        .await
    }

    async fn insert_bookmark(&self, new: NewBookmark) -> Result<Bookmark, StoreError> {
        if new.user_id.is_empty() {
            return Err(StoreError::Unauthorized("missing user id".to_string()));
        }

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            title: new.title,
            url: new.url,
            created_at: self.next_created_at(),
        };

        let row = bookmark.clone();
        self.run_blocking(move |db| {
            db.connection()
                .execute(
                    "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![row.id, row.user_id, row.title, row.url, row.created_at],
                )
                .map_err(|e| StoreError::Database(e.to_string()))
        })
        .await?;

        let delivered = self.feed.publish(ChangeEvent::Insert {
            row: bookmark.clone(),
        });
        debug!(
            "event=bookmark_insert module=store status=ok id={} subscribers={}",
            bookmark.id, delivered
        );
        Ok(bookmark)
    }

    async fn delete_bookmark(&self, user_id: &str, id: &str) -> Result<(), StoreError> {
        let (owner, target) = (user_id.to_string(), id.to_string());
        let affected = self
            .run_blocking(move |db| {
                db.connection()
                    .execute(
                        "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
                        params![target, owner],
                    )
                    .map_err(|e| StoreError::Database(e.to_string()))
            })
            .await?;

        if affected == 0 {
            debug!("event=bookmark_delete module=store status=noop id={}", id);
            return Ok(());
        }

        self.feed.publish(ChangeEvent::Delete { id: id.to_string() });
        debug!("event=bookmark_delete module=store status=ok id={}", id);
        Ok(())
    }

    async fn subscribe_to_changes(&self, scope: ChangeScope) -> Result<ChangeSubscription, StoreError> {
        self.feed.subscribe(scope).map_err(|e| {
            warn!("event=subscribe module=store status=error reason={}", e);
            e
        })
    }
}
