use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// A row-level change pushed by the store to live subscriptions.
///
/// Delete notifications carry only the identifier of the removed row,
/// so they cannot be attributed to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Insert { row: Bookmark },
    Delete { id: String },
    /// Any change kind the reconciler does not interpret (updates, resyncs).
    Other,
}

impl ChangeEvent {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "insert",
            ChangeEvent::Delete { .. } => "delete",
            ChangeEvent::Other => "other",
        }
    }
}

/// Which rows a subscription is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeScope {
    pub user_id: String,
}

impl ChangeScope {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }

    /// Returns true if the event should be delivered under this scope.
    pub fn admits(&self, event: &ChangeEvent) -> bool {
        match event {
            ChangeEvent::Insert { row } => row.user_id == self.user_id,
            ChangeEvent::Delete { .. } | ChangeEvent::Other => true,
        }
    }
}
