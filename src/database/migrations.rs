//! Schema migrations for the markstash SQLite database.
//!
//! Each entry in [`MIGRATIONS`] is applied once, inside its own transaction,
//! and recorded in `schema_version`.

use rusqlite::{params, Connection};

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Bookmarks table",
        sql: "
            CREATE TABLE IF NOT EXISTS bookmarks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL CHECK (length(title) > 0),
                url TEXT NOT NULL CHECK (length(url) > 0),
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_bookmarks_user_created
                ON bookmarks(user_id, created_at DESC);
        ",
    },
    Migration {
        version: 2,
        description: "Auth session and pending sign-in state",
        sql: "
            CREATE TABLE IF NOT EXISTS auth_session (
                id TEXT PRIMARY KEY DEFAULT 'default',
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                provider TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS oauth_pending (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                redirect_target TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
        ",
    },
];

/// Highest applied migration, or 0 on a fresh database.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })
    .unwrap_or(0)
}

/// Brings the schema up to [`CURRENT_SCHEMA_VERSION`]. Safe to call on every open.
///
/// # Errors
/// Returns `rusqlite::Error` if any SQL statement fails; the failing
/// migration is rolled back and later ones are not attempted.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let applied = get_schema_version(conn);
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![migration.version, unix_seconds(), migration.description],
        )?;
        tx.commit()?;
        log::debug!(
            "event=migration module=database status=ok version={}",
            migration.version
        );
    }
    Ok(())
}

fn unix_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
