//! SQLite-backed entry store.
//!
//! One [`Database`] holds the queue (entries, blocks, moderation log) and,
//! for the bundled [`SqliteDocumentStore`](crate::document::SqliteDocumentStore),
//! the pages themselves. Components share it as an `Arc<Database>`.
//!
//! The connection mutex only serializes statements issued by this process.
//! Entry transitions do not rely on it: [`Database::transition_entry`] is a
//! compare-and-set on `state = 'pending'`, which also holds when several
//! processes open the same file.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// How long a statement waits on another process's write lock.
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database file at `path` in WAL mode.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening entry store");

        let conn = Connection::open(path)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
        ))?;

        debug!(busy_timeout_ms = BUSY_TIMEOUT_MS, "entry store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, for tests and throwaway runs.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Bring the schema up to the latest version.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        let conn = self.conn();
        schema::run_migrations(&conn)?;
        debug!("entry store schema is up to date");
        Ok(())
    }

    /// Lock the connection. A poisoned lock is recovered: every write goes
    /// through SQLite's own transactions, so a panicking holder cannot leave
    /// a half-applied change behind.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("entry store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` in a `BEGIN IMMEDIATE` transaction, committed only if `f`
    /// returns `Ok`.
    ///
    /// The write lock is taken up front, so a read-then-write inside `f`
    /// (such as a page compare-and-set) cannot be interleaved by another
    /// process between its read and its write.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryState, NewEntry};

    fn new_entry(target: &str) -> NewEntry<'_> {
        NewEntry {
            author: "User 5",
            target,
            base_revision: None,
            proposed_text: "text",
            summary: "",
        }
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modqueue.db");

        let id = {
            let db = Database::new(&path).unwrap();
            db.initialize().unwrap();
            db.insert_entry(&new_entry("Page A")).unwrap().id
        };

        let db = Database::new(&path).unwrap();
        db.initialize().unwrap();
        let entry = db.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.state, EntryState::Pending);
        assert_eq!(entry.target, "Page A");
    }

    #[test]
    fn test_two_handles_resolve_an_entry_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modqueue.db");
        let first = Database::new(&path).unwrap();
        first.initialize().unwrap();
        let second = Database::new(&path).unwrap();

        let id = first.insert_entry(&new_entry("Page A")).unwrap().id;
        assert!(second
            .transition_entry(id, EntryState::Rejected, "User 2", None)
            .unwrap());
        assert!(!first
            .transition_entry(id, EntryState::Approved, "User 1", None)
            .unwrap());
        assert_eq!(
            first.get_entry(id).unwrap().unwrap().state,
            EntryState::Rejected
        );
    }

    #[test]
    fn test_failed_transaction_queues_nothing() {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();

        let result: Result<(), DatabaseError> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO entries (author, target, proposed_text, summary, state,
                 conflict_flag, created_at)
                 VALUES ('User 5', 'Page A', 'x', '', 'pending', 0, '2025-01-01T00:00:00Z')",
                [],
            )?;
            Err(DatabaseError::NotFound {
                entity: "page".into(),
                id: "Page A".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(db.count_entries_by_state(EntryState::Pending).unwrap(), 0);
    }
}
