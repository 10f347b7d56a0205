//! Typed query helpers for every table in the ModQueue database.
//!
//! Entry state changes go through [`Database::transition_entry`], which is a
//! compare-and-set on `state = 'pending'`: for one entry at most one
//! transition out of `Pending` can ever succeed.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{
    BatchFilter, BlockRecord, BlockSubject, Entry, EntryState, Folder, LogEntry, NewEntry,
    RevisionId,
};

const ENTRY_COLUMNS: &str = "id, author, target, base_revision, proposed_text, summary, state,
     conflict_flag, created_at, resolved_by, resolved_at, resolved_revision";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let state_str: String = row.get(6)?;
    let state = EntryState::parse(&state_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(6, "state".into(), Type::Text))?;
    let created_at: String = row.get(8)?;
    let resolved_at: Option<String> = row.get(10)?;
    Ok(Entry {
        id: row.get(0)?,
        author: row.get(1)?,
        target: row.get(2)?,
        base_revision: row.get::<_, Option<String>>(3)?.map(RevisionId),
        proposed_text: row.get(4)?,
        summary: row.get(5)?,
        state,
        conflict_flag: row.get::<_, i64>(7)? != 0,
        created_at: parse_datetime(&created_at),
        resolved_by: row.get(9)?,
        resolved_at: resolved_at.as_deref().map(parse_datetime),
        resolved_revision: row.get::<_, Option<String>>(11)?.map(RevisionId),
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<BlockRecord> {
    let kind: String = row.get(1)?;
    let name: String = row.get(2)?;
    let subject = BlockSubject::from_parts(&kind, name)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(1, "kind".into(), Type::Text))?;
    let created_at: String = row.get(4)?;
    Ok(BlockRecord {
        id: row.get(0)?,
        subject,
        blocked_by: row.get(3)?,
        created_at: parse_datetime(&created_at),
    })
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- entries ------------------------------------------------------------

    /// Insert a new `Pending` entry and return it with its assigned id.
    pub fn insert_entry(&self, new: &NewEntry<'_>) -> Result<Entry, DatabaseError> {
        let now = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO entries (author, target, base_revision, proposed_text, summary,
             state, conflict_flag, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6)",
            params![
                new.author,
                new.target,
                new.base_revision.map(|r| r.as_str()),
                new.proposed_text,
                new.summary,
                now.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, author = new.author, target = new.target, "inserted entry");
        Ok(Entry {
            id,
            author: new.author.to_string(),
            target: new.target.to_string(),
            base_revision: new.base_revision.cloned(),
            proposed_text: new.proposed_text.to_string(),
            summary: new.summary.to_string(),
            state: EntryState::Pending,
            conflict_flag: false,
            created_at: now,
            resolved_by: None,
            resolved_at: None,
            resolved_revision: None,
        })
    }

    /// Get an entry by id, returning `None` if it does not exist.
    pub fn get_entry(&self, id: i64) -> Result<Option<Entry>, DatabaseError> {
        let conn = self.conn();
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// List the entries of one folder, newest first.
    pub fn list_folder(&self, folder: Folder, limit: u32) -> Result<Vec<Entry>, DatabaseError> {
        let states = folder.states();
        let placeholders = (0..states.len())
            .map(|i| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE state IN ({placeholders})
             ORDER BY id DESC LIMIT ?{}",
            states.len() + 1
        );

        let mut bound: Vec<Box<dyn rusqlite::types::ToSql>> = states
            .iter()
            .map(|s| Box::new(s.to_string()) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        bound.push(Box::new(limit));
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(param_refs.as_slice(), entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// List pending entries matching `filter`, oldest first.
    pub fn list_pending(&self, filter: &BatchFilter) -> Result<Vec<Entry>, DatabaseError> {
        let (sql, bound): (String, Option<String>) = match filter {
            BatchFilter::All => (
                format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE state = 'pending' ORDER BY id ASC"),
                None,
            ),
            BatchFilter::Author(a) => (
                format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE state = 'pending' AND author = ?1
                     ORDER BY id ASC"
                ),
                Some(a.clone()),
            ),
            BatchFilter::Target(t) => (
                format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE state = 'pending' AND target = ?1
                     ORDER BY id ASC"
                ),
                Some(t.clone()),
            ),
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = match bound {
            Some(value) => stmt.query_map(params![value], entry_from_row)?,
            None => stmt.query_map([], entry_from_row)?,
        };
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Mark a pending entry as conflicted. Returns `false` if the entry is
    /// no longer pending.
    pub fn set_conflict_flag(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE entries SET conflict_flag = 1 WHERE id = ?1 AND state = 'pending'",
            params![id],
        )?;
        debug!(id, changed, "set conflict flag");
        Ok(changed == 1)
    }

    /// Compare-and-set an entry from `Pending` to the terminal state `to`.
    ///
    /// Returns `false` if the entry was not pending (already resolved by a
    /// concurrent action, or missing).
    pub fn transition_entry(
        &self,
        id: i64,
        to: EntryState,
        resolved_by: &str,
        resolved_revision: Option<&RevisionId>,
    ) -> Result<bool, DatabaseError> {
        if !to.is_terminal() {
            return Err(DatabaseError::Corrupt {
                entity: "entry".into(),
                detail: format!("refusing transition of entry {id} back to pending"),
            });
        }
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE entries SET state = ?1, resolved_by = ?2, resolved_at = ?3,
             resolved_revision = ?4
             WHERE id = ?5 AND state = 'pending'",
            params![
                to.to_string(),
                resolved_by,
                now,
                resolved_revision.map(|r| r.as_str()),
                id
            ],
        )?;
        debug!(id, to = %to, changed, "entry transition");
        Ok(changed == 1)
    }

    /// Count entries in a given state.
    pub fn count_entries_by_state(&self, state: EntryState) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE state = ?1",
            params![state.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // -- blocks -------------------------------------------------------------

    /// Create a block record. Returns `None` if the subject is already blocked.
    pub fn insert_block(
        &self,
        subject: &BlockSubject,
        blocked_by: &str,
    ) -> Result<Option<BlockRecord>, DatabaseError> {
        let now = Utc::now();
        let conn = self.conn();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO blocks (kind, name, blocked_by, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![subject.kind(), subject.name(), blocked_by, now.to_rfc3339()],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let id = conn.last_insert_rowid();
        debug!(id, subject = %subject, "inserted block");
        Ok(Some(BlockRecord {
            id,
            subject: subject.clone(),
            blocked_by: blocked_by.to_string(),
            created_at: now,
        }))
    }

    /// Remove the block record for `subject`. Returns `false` if none existed.
    pub fn delete_block(&self, subject: &BlockSubject) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute(
            "DELETE FROM blocks WHERE kind = ?1 AND name = ?2",
            params![subject.kind(), subject.name()],
        )?;
        debug!(subject = %subject, changed, "deleted block");
        Ok(changed == 1)
    }

    /// Check whether `subject` currently has a block record.
    pub fn is_subject_blocked(&self, subject: &BlockSubject) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blocks WHERE kind = ?1 AND name = ?2",
            params![subject.kind(), subject.name()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List all block records, oldest first.
    pub fn list_blocks(&self) -> Result<Vec<BlockRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, kind, name, blocked_by, created_at FROM blocks ORDER BY id ASC",
        )?;
        let blocks = stmt
            .query_map([], block_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    // -- moderation_log -----------------------------------------------------

    /// Append a moderation-log row.
    pub fn insert_log(
        &self,
        action: &str,
        actor: &str,
        entry_id: Option<i64>,
        target: Option<&str>,
        details: &serde_json::Value,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO moderation_log (action, actor, entry_id, target, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![action, actor, entry_id, target, details.to_string(), now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, action, actor, "inserted moderation_log entry");
        Ok(id)
    }

    /// List recent moderation-log rows, newest first.
    pub fn list_log(&self, limit: u32) -> Result<Vec<LogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, action, actor, entry_id, target, details, created_at
             FROM moderation_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                let details: String = row.get(5)?;
                let created_at: String = row.get(6)?;
                Ok(LogEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    actor: row.get(2)?,
                    entry_id: row.get(3)?,
                    target: row.get(4)?,
                    details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Parse a datetime string, returning Utc::now() as a fallback if parsing fails.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
