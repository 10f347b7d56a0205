//! Database schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The `schema_version`
//! user-version pragma tracks which migrations have already been applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
/// Versions start at 1. The current schema version is stored in the SQLite
/// `user_version` pragma.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "moderation queue",
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            author            TEXT    NOT NULL,
            target            TEXT    NOT NULL,
            base_revision     TEXT,
            proposed_text     TEXT    NOT NULL,
            summary           TEXT    NOT NULL DEFAULT '',
            state             TEXT    NOT NULL DEFAULT 'pending'
                CHECK (state IN ('pending', 'approved', 'rejected', 'rejected_batch', 'merged', 'blocked')),
            conflict_flag     INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT    NOT NULL,
            resolved_by       TEXT,
            resolved_at       TEXT,
            resolved_revision TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_entries_state ON entries (state);
        CREATE INDEX IF NOT EXISTS idx_entries_target ON entries (target);
        CREATE INDEX IF NOT EXISTS idx_entries_author ON entries (author);

        CREATE TABLE IF NOT EXISTS blocks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            kind        TEXT NOT NULL CHECK (kind IN ('author', 'target')),
            name        TEXT NOT NULL,
            blocked_by  TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE (kind, name)
        );

        CREATE TABLE IF NOT EXISTS moderation_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            action      TEXT NOT NULL,
            actor       TEXT NOT NULL,
            entry_id    INTEGER,
            target      TEXT,
            details     TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_moderation_log_action ON moderation_log (action);
        CREATE INDEX IF NOT EXISTS idx_moderation_log_entry ON moderation_log (entry_id);
        "#,
    ),
    (
        2,
        "local document store",
        r#"
        CREATE TABLE IF NOT EXISTS page_revisions (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            revision_id TEXT NOT NULL UNIQUE,
            target      TEXT NOT NULL,
            text        TEXT NOT NULL,
            summary     TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_page_revisions_target ON page_revisions (target);

        CREATE TABLE IF NOT EXISTS pages (
            target      TEXT PRIMARY KEY,
            revision_id TEXT NOT NULL REFERENCES page_revisions (revision_id)
        );
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        for table in ["entries", "blocks", "moderation_log", "pages", "page_revisions"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_state_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO entries (author, target, proposed_text, state, created_at)
             VALUES ('a', 'b', 'c', 'spam', '2025-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
