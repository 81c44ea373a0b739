//! SQLite persistence for bookmarks and the auth session.
//!
//! ```no_run
//! use markstash::database::Database;
//!
//! let db = Database::open("markstash.db").expect("failed to open database");
//! let count: i64 = db
//!     .connection()
//!     .query_row("SELECT COUNT(*) FROM bookmarks", [], |row| row.get(0))
//!     .expect("count bookmarks");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
