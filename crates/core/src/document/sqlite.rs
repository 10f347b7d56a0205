//! [`DocumentStore`] on the same SQLite database as the entry store.
//!
//! Used by the `modqueue` CLI so that a single data directory holds both
//! the queue and the pages it moderates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::DocumentStore;
use crate::db::Database;
use crate::errors::{DatabaseError, DocumentError};
use crate::models::{Revision, RevisionId};

pub struct SqliteDocumentStore {
    db: Arc<Database>,
}

impl SqliteDocumentStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Every revision of `target`, oldest first.
    pub fn history(&self, target: &str) -> Result<Vec<Revision>, DocumentError> {
        let conn = self.db.conn();
        let mut stmt = conn
            .prepare("SELECT revision_id, text FROM page_revisions WHERE target = ?1 ORDER BY seq ASC")
            .map_err(DatabaseError::from)?;
        let revisions = stmt
            .query_map(params![target], revision_from_row)
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(DatabaseError::from)?;
        Ok(revisions)
    }

    /// Run `f` on the blocking pool. The connection lock and SQLite's busy
    /// wait then never stall the runtime, and a caller's deadline can give
    /// up on the call.
    async fn blocking<T, F>(&self, f: F) -> Result<T, DocumentError>
    where
        F: FnOnce(&Database) -> Result<T, DocumentError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DocumentError::Unavailable(format!("page store task failed: {e}")))?
    }
}

fn revision_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Revision> {
    Ok(Revision {
        id: RevisionId(row.get(0)?),
        text: row.get(1)?,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn current_revision(&self, target: &str) -> Result<Option<Revision>, DocumentError> {
        let target = target.to_string();
        self.blocking(move |db| {
            let revision = db
                .conn()
                .query_row(
                    "SELECT r.revision_id, r.text FROM pages p
                     JOIN page_revisions r ON r.revision_id = p.revision_id
                     WHERE p.target = ?1",
                    params![target],
                    revision_from_row,
                )
                .optional()
                .map_err(DatabaseError::from)?;
            Ok(revision)
        })
        .await
    }

    async fn revision_text(
        &self,
        target: &str,
        revision: &RevisionId,
    ) -> Result<Option<String>, DocumentError> {
        let target = target.to_string();
        let revision = revision.clone();
        self.blocking(move |db| {
            let text = db
                .conn()
                .query_row(
                    "SELECT text FROM page_revisions WHERE target = ?1 AND revision_id = ?2",
                    params![target, revision.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(DatabaseError::from)?;
            Ok(text)
        })
        .await
    }

    async fn apply_change(
        &self,
        target: &str,
        base: Option<&RevisionId>,
        text: &str,
        summary: &str,
    ) -> Result<RevisionId, DocumentError> {
        let new_id = RevisionId::generate();
        let (target, base) = (target.to_string(), base.cloned());
        let (text, summary) = (text.to_string(), summary.to_string());

        self.blocking(move |db| {
            let outcome = db.transaction(|tx| {
                let current: Option<String> = tx
                    .query_row(
                        "SELECT revision_id FROM pages WHERE target = ?1",
                        params![target],
                        |row| row.get(0),
                    )
                    .optional()?;
                if current.as_deref() != base.as_ref().map(|b| b.as_str()) {
                    return Ok(Err(current));
                }
                tx.execute(
                    "INSERT INTO page_revisions (revision_id, target, text, summary, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![new_id.as_str(), target, text, summary, Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO pages (target, revision_id) VALUES (?1, ?2)
                     ON CONFLICT(target) DO UPDATE SET revision_id = excluded.revision_id",
                    params![target, new_id.as_str()],
                )?;
                Ok(Ok(()))
            })?;

            match outcome {
                Ok(()) => {
                    debug!(target = %target, revision = %new_id, "sqlite store applied change");
                    Ok(new_id)
                }
                Err(actual) => Err(DocumentError::StaleBase {
                    target,
                    expected: base.map(|b| b.to_string()).unwrap_or_else(|| "<none>".into()),
                    actual: actual.unwrap_or_else(|| "<none>".into()),
                }),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::document::with_timeout;

    fn store() -> SqliteDocumentStore {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        SqliteDocumentStore::new(db)
    }

    #[tokio::test]
    async fn test_create_update_and_history() {
        let store = store();
        assert!(store.current_revision("Page").await.unwrap().is_none());

        let r1 = store.apply_change("Page", None, "one", "create").await.unwrap();
        let r2 = store
            .apply_change("Page", Some(&r1), "two", "update")
            .await
            .unwrap();

        let current = store.current_revision("Page").await.unwrap().unwrap();
        assert_eq!(current.id, r2);
        assert_eq!(current.text, "two");
        assert_eq!(
            store.revision_text("Page", &r1).await.unwrap().as_deref(),
            Some("one")
        );
        assert_eq!(store.history("Page").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_base_leaves_page_untouched() {
        let store = store();
        let r1 = store.apply_change("Page", None, "one", "").await.unwrap();
        store.apply_change("Page", Some(&r1), "two", "").await.unwrap();

        let result = store.apply_change("Page", Some(&r1), "three", "").await;
        assert!(matches!(result, Err(DocumentError::StaleBase { .. })));
        assert_eq!(store.history("Page").unwrap().len(), 2);
        assert_eq!(
            store.current_revision("Page").await.unwrap().unwrap().text,
            "two"
        );
    }

    #[tokio::test]
    async fn test_held_connection_times_out_instead_of_stalling() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        let store = SqliteDocumentStore::new(db.clone());

        let guard = db.conn();
        let result = with_timeout(
            "current_revision",
            Duration::from_millis(50),
            store.current_revision("Page"),
        )
        .await;
        drop(guard);

        assert!(matches!(result, Err(DocumentError::Timeout { .. })));
    }
}
