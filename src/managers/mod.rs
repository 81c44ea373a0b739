// markstash state managers
// Managers own stateful data: the bookmark store and the per-user bookmark view.

pub mod bookmark_store;
pub mod bookmark_view_model;
