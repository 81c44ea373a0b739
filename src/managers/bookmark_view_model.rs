//! Bookmark view-model for markstash.
//!
//! Holds the signed-in user's bookmark list, issues create/delete requests to
//! a [`BookmarkStore`], and keeps the list consistent with the store through
//! its own refreshes plus a background task that consumes change
//! notifications under the configured [`ReconcilePolicy`].
//!
//! State lives behind a std mutex that is never held across an `.await`, so
//! operations take `&self` and may overlap; each one re-reads state after its
//! store request completes instead of assuming nothing changed meanwhile.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::managers::bookmark_store::{BookmarkStore, ChangeSubscription, Delivery};
use crate::services::reconciler;
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::change::{ChangeEvent, ChangeScope};
use crate::types::errors::{StoreError, ValidationError, ViewModelError};
use crate::types::settings::{ReconcilePolicy, SyncSettings};

/// Banner shown once the pump gives up on the notification transport.
pub const LIVE_UPDATES_STOPPED: &str = "Live updates stopped; refresh to see new changes";

/// Runtime knobs for a view-model.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModelOptions {
    pub policy: ReconcilePolicy,
    pub request_timeout: Duration,
    pub resubscribe_attempts: u32,
    pub resubscribe_backoff: Duration,
}

impl Default for ViewModelOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for ViewModelOptions {
    fn from(sync: &SyncSettings) -> Self {
        Self {
            policy: sync.policy,
            request_timeout: Duration::from_millis(sync.request_timeout_ms),
            resubscribe_attempts: sync.resubscribe_attempts,
            resubscribe_backoff: Duration::from_millis(sync.resubscribe_backoff_ms),
        }
    }
}

/// Result of a [`BookmarkViewModel::create`] call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Bookmark),
    /// Another create was still in flight; nothing was sent.
    Busy,
}

/// Result of a [`BookmarkViewModel::delete`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// A delete for the same id was still in flight; nothing was sent.
    AlreadyPending,
}

/// Point-in-time copy of everything a view renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    pub user_id: String,
    pub bookmarks: Vec<Bookmark>,
    pub pending_delete_id: Option<String>,
    pub submission_error: Option<String>,
    pub is_submitting: bool,
    pub banner: Option<String>,
    pub draft_title: String,
    pub draft_url: String,
    pub revision: u64,
    pub closed: bool,
}

struct ViewState {
    user_id: String,
    bookmarks: Vec<Bookmark>,
    pending_delete_id: Option<String>,
    submission_error: Option<String>,
    is_submitting: bool,
    banner: Option<String>,
    draft_title: String,
    draft_url: String,
    refresh_issued: u64,
    refresh_applied: u64,
    revision: u64,
    closed: bool,
}

struct Shared {
    store: Arc<dyn BookmarkStore>,
    options: ViewModelOptions,
    state: Mutex<ViewState>,
    revision_tx: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Marks a state change and notifies watchers. Call with the lock held.
    fn bump(&self, st: &mut ViewState) {
        st.revision += 1;
        self.revision_tx.send_replace(st.revision);
    }

    fn set_banner(&self, message: String) {
        let mut st = self.lock();
        st.banner = Some(message);
        self.bump(&mut st);
    }

    async fn with_timeout<T, F>(&self, op: &str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.options.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(op.to_string())),
        }
    }

    async fn refresh(&self) -> Result<(), ViewModelError> {
        let (user_id, ticket) = {
            let mut st = self.lock();
            if st.closed {
                return Err(ViewModelError::Closed);
            }
            st.refresh_issued += 1;
            (st.user_id.clone(), st.refresh_issued)
        };

        let result = self
            .with_timeout("list_bookmarks", self.store.list_bookmarks(&user_id))
            .await;

        let mut st = self.lock();
        if st.closed {
            return Err(ViewModelError::Closed);
        }
        match result {
            Ok(list) => {
                if ticket > st.refresh_applied {
                    st.refresh_applied = ticket;
                    st.bookmarks = reconciler::normalize(list);
                    self.bump(&mut st);
                } else {
                    debug!(
                        "event=refresh module=view_model status=stale ticket={} applied={}",
                        ticket, st.refresh_applied
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!("event=refresh module=view_model status=error reason={}", e);
                st.banner = Some(e.to_string());
                self.bump(&mut st);
                Err(e.into())
            }
        }
    }

    async fn handle_event(&self, event: ChangeEvent) {
        debug!(
            "event=change_received module=view_model kind={} policy={:?}",
            event.kind(),
            self.options.policy
        );
        match self.options.policy {
            ReconcilePolicy::Patch => {
                let mut st = self.lock();
                if st.closed {
                    return;
                }
                let next = reconciler::apply_change(&st.bookmarks, &event);
                if next != st.bookmarks {
                    st.bookmarks = next;
                    self.bump(&mut st);
                }
            }
            ReconcilePolicy::Refetch => {
                let _ = self.refresh().await;
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Consumes change notifications until the view-model is closed.
///
/// When the transport ends, resubscribes up to `resubscribe_attempts` times
/// in a row and refreshes after each successful resubscribe, since
/// notifications sent while disconnected are lost.
async fn run_pump(shared: Arc<Shared>, mut subscription: Option<ChangeSubscription>) {
    let user_id = shared.lock().user_id.clone();
    let mut attempts_left = shared.options.resubscribe_attempts;

    loop {
        if let Some(sub) = subscription.as_mut() {
            while let Some(delivery) = sub.next().await {
                if shared.is_closed() {
                    return;
                }
                attempts_left = shared.options.resubscribe_attempts;
                match delivery {
                    Delivery::Event(event) => shared.handle_event(event).await,
                    Delivery::Missed(count) => {
                        warn!(
                            "event=change_lagged module=view_model missed={} action=refresh",
                            count
                        );
                        let _ = shared.refresh().await;
                    }
                }
            }
        }

        if shared.is_closed() {
            return;
        }
        if attempts_left == 0 {
            warn!(
                "event=subscription_lost module=view_model status=gave_up user_id={}",
                user_id
            );
            shared.set_banner(LIVE_UPDATES_STOPPED.to_string());
            return;
        }
        attempts_left -= 1;

        tokio::time::sleep(shared.options.resubscribe_backoff).await;
        if shared.is_closed() {
            return;
        }

        let resubscribed = shared
            .with_timeout(
                "subscribe_to_changes",
                shared.store.subscribe_to_changes(ChangeScope::for_user(&user_id)),
            )
            .await;
        match resubscribed {
            Ok(sub) => {
                info!(
                    "event=subscription_restored module=view_model status=ok attempts_left={}",
                    attempts_left
                );
                subscription = Some(sub);
                let _ = shared.refresh().await;
            }
            Err(e) => {
                warn!(
                    "event=subscription_restore module=view_model status=error attempts_left={} reason={}",
                    attempts_left, e
                );
                subscription = None;
            }
        }
    }
}

/// The bookmark list of one signed-in user, kept in sync with the store.
pub struct BookmarkViewModel {
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BookmarkViewModel {
    /// Seeds the list (sorted newest first) and opens a change subscription
    /// for `user_id`, spawning the task that reconciles notifications.
    ///
    /// A failed subscribe is not fatal: the background task retries it under
    /// the resubscribe policy. Callers typically follow up with [`refresh`]
    /// to correct a stale seed.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// [`refresh`]: Self::refresh
    pub async fn initialize(
        store: Arc<dyn BookmarkStore>,
        user_id: &str,
        seed: Vec<Bookmark>,
        options: ViewModelOptions,
    ) -> Self {
        let (revision_tx, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            store,
            options,
            state: Mutex::new(ViewState {
                user_id: user_id.to_string(),
                bookmarks: reconciler::normalize(seed),
                pending_delete_id: None,
                submission_error: None,
                is_submitting: false,
                banner: None,
                draft_title: String::new(),
                draft_url: String::new(),
                refresh_issued: 0,
                refresh_applied: 0,
                revision: 0,
                closed: false,
            }),
            revision_tx,
        });

        let subscription = match shared
            .with_timeout(
                "subscribe_to_changes",
                shared.store.subscribe_to_changes(ChangeScope::for_user(user_id)),
            )
            .await
        {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!("event=subscribe module=view_model status=error reason={}", e);
                None
            }
        };

        let pump = tokio::spawn(run_pump(shared.clone(), subscription));
        info!(
            "event=view_model_init module=view_model status=ok policy={:?}",
            shared.options.policy
        );

        Self {
            shared,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Replaces the list with the store's current rows for this user.
    pub async fn refresh(&self) -> Result<(), ViewModelError> {
        self.shared.refresh().await
    }

    /// Creates a bookmark from a title and URL.
    ///
    /// Both are trimmed first; an empty field is reported through
    /// `submission_error` and nothing is sent. A create issued while another
    /// is in flight returns [`CreateOutcome::Busy`]. A store failure is
    /// reported through `submission_error` and leaves the list unchanged.
    pub async fn create(&self, title: &str, url: &str) -> Result<CreateOutcome, ViewModelError> {
        let title = title.trim();
        let url = url.trim();

        let user_id = {
            let mut st = self.shared.lock();
            if st.closed {
                return Err(ViewModelError::Closed);
            }
            let invalid = if title.is_empty() {
                Some(ValidationError::EmptyTitle)
            } else if url.is_empty() {
                Some(ValidationError::EmptyUrl)
            } else {
                None
            };
            if let Some(e) = invalid {
                st.submission_error = Some(e.to_string());
                self.shared.bump(&mut st);
                return Err(e.into());
            }
            if st.is_submitting {
                return Ok(CreateOutcome::Busy);
            }
            st.is_submitting = true;
            st.submission_error = None;
            self.shared.bump(&mut st);
            st.user_id.clone()
        };

        let new = NewBookmark {
            title: title.to_string(),
            url: url.to_string(),
            user_id,
        };
        let result = self
            .shared
            .with_timeout("insert_bookmark", self.shared.store.insert_bookmark(new))
            .await;

        match result {
            Ok(row) => {
                {
                    let mut st = self.shared.lock();
                    st.draft_title.clear();
                    st.draft_url.clear();
                    self.shared.bump(&mut st);
                }
                // The inserting session may see its own notification late or never.
                let _ = self.shared.refresh().await;
                let mut st = self.shared.lock();
                st.is_submitting = false;
                self.shared.bump(&mut st);
                info!("event=bookmark_create module=view_model status=ok id={}", row.id);
                Ok(CreateOutcome::Created(row))
            }
            Err(e) => {
                warn!("event=bookmark_create module=view_model status=error reason={}", e);
                let mut st = self.shared.lock();
                st.is_submitting = false;
                st.submission_error = Some(e.to_string());
                self.shared.bump(&mut st);
                Err(e.into())
            }
        }
    }

    /// Creates a bookmark from the draft fields set through
    /// [`set_title`](Self::set_title) and [`set_url`](Self::set_url).
    pub async fn submit(&self) -> Result<CreateOutcome, ViewModelError> {
        let (title, url) = {
            let st = self.shared.lock();
            (st.draft_title.clone(), st.draft_url.clone())
        };
        self.create(&title, &url).await
    }

    pub fn set_title(&self, title: &str) {
        let mut st = self.shared.lock();
        st.draft_title = title.to_string();
        self.shared.bump(&mut st);
    }

    pub fn set_url(&self, url: &str) {
        let mut st = self.shared.lock();
        st.draft_url = url.to_string();
        self.shared.bump(&mut st);
    }

    /// Deletes a bookmark by id, then refreshes.
    ///
    /// While the request is outstanding `pending_delete_id` names the row and
    /// a second delete for the same id is a no-op. Failures go to the banner,
    /// never to `submission_error`.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, ViewModelError> {
        let user_id = {
            let mut st = self.shared.lock();
            if st.closed {
                return Err(ViewModelError::Closed);
            }
            if st.pending_delete_id.as_deref() == Some(id) {
                return Ok(DeleteOutcome::AlreadyPending);
            }
            st.pending_delete_id = Some(id.to_string());
            self.shared.bump(&mut st);
            st.user_id.clone()
        };

        let result = self
            .shared
            .with_timeout("delete_bookmark", self.shared.store.delete_bookmark(&user_id, id))
            .await;
        if let Err(e) = &result {
            warn!("event=bookmark_delete module=view_model status=error id={} reason={}", id, e);
            self.shared.set_banner(e.to_string());
        }

        let _ = self.shared.refresh().await;

        {
            let mut st = self.shared.lock();
            // A delete on another row may have taken the slot meanwhile.
            if st.pending_delete_id.as_deref() == Some(id) {
                st.pending_delete_id = None;
                self.shared.bump(&mut st);
            }
        }

        result?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Clears the transient banner.
    pub fn dismiss_banner(&self) {
        let mut st = self.shared.lock();
        if st.banner.take().is_some() {
            self.shared.bump(&mut st);
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let st = self.shared.lock();
        ViewSnapshot {
            user_id: st.user_id.clone(),
            bookmarks: st.bookmarks.clone(),
            pending_delete_id: st.pending_delete_id.clone(),
            submission_error: st.submission_error.clone(),
            is_submitting: st.is_submitting,
            banner: st.banner.clone(),
            draft_title: st.draft_title.clone(),
            draft_url: st.draft_url.clone(),
            revision: st.revision,
            closed: st.closed,
        }
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.shared.lock().bookmarks.clone()
    }

    pub fn user_id(&self) -> String {
        self.shared.lock().user_id.clone()
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.shared.options.policy
    }

    /// Subscribes to the state revision counter, bumped on every change.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.shared.revision_tx.subscribe()
    }

    /// Tears down the change subscription. Idempotent.
    ///
    /// Operations issued afterwards fail with [`ViewModelError::Closed`] and
    /// no further notifications are applied.
    pub fn close(&self) {
        {
            let mut st = self.shared.lock();
            if st.closed {
                return;
            }
            st.closed = true;
            self.shared.bump(&mut st);
        }
        let handle = self
            .pump
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        info!("event=view_model_close module=view_model status=ok");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for BookmarkViewModel {
    fn drop(&mut self) {
        self.close();
    }
}
