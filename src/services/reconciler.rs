//! Pure list reconciliation for bookmark change notifications.
//!
//! Every function here maps (current list, input) to a new list without
//! touching the store, so the patch policy can be exercised without a
//! transport. Notifications may arrive duplicated or out of order; the
//! result depends only on the list and the event being applied.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeEvent;

/// Newest first; equal timestamps fall back to id, descending.
fn newest_first(a: &Bookmark, b: &Bookmark) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Sorts a list in display order (`created_at` descending).
pub fn sort_newest_first(list: &mut [Bookmark]) {
    list.sort_by(newest_first);
}

/// Drops repeated ids (first occurrence wins) and sorts newest first.
pub fn normalize(list: Vec<Bookmark>) -> Vec<Bookmark> {
    let mut seen = HashSet::with_capacity(list.len());
    let mut out: Vec<Bookmark> = list
        .into_iter()
        .filter(|b| seen.insert(b.id.clone()))
        .collect();
    sort_newest_first(&mut out);
    out
}

/// Applies one change notification under the patch policy.
///
/// - Insert: merged only when the id is absent, then the list is re-sorted.
/// - Delete: every row with that id is removed; the rest keep their order.
/// - Other: ignored.
pub fn apply_change(current: &[Bookmark], event: &ChangeEvent) -> Vec<Bookmark> {
    match event {
        ChangeEvent::Insert { row } => {
            if current.iter().any(|b| b.id == row.id) {
                return current.to_vec();
            }
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend_from_slice(current);
            next.push(row.clone());
            sort_newest_first(&mut next);
            next
        }
        ChangeEvent::Delete { id } => current.iter().filter(|b| &b.id != id).cloned().collect(),
        ChangeEvent::Other => current.to_vec(),
    }
}

/// Folds a sequence of notifications over a starting list.
pub fn apply_all<'a, I>(start: &[Bookmark], events: I) -> Vec<Bookmark>
where
    I: IntoIterator<Item = &'a ChangeEvent>,
{
    events
        .into_iter()
        .fold(start.to_vec(), |list, event| apply_change(&list, event))
}
