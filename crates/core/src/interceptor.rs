//! Submission interceptor.
//!
//! Every edit enters through [`Interceptor::submit`], which decides whether
//! the edit is applied to the document store right away or held as a
//! `Pending` entry for review. Nothing else creates pending entries.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::document::{with_timeout, DocumentStore};
use crate::errors::ModerationError;
use crate::models::{NewEntry, RevisionId};
use crate::permissions::PermissionOracle;

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The author may bypass moderation; the document now has `revision`.
    AppliedDirectly { revision: RevisionId },
    /// Held for review as entry `id`.
    Queued(i64),
}

pub struct Interceptor {
    oracle: PermissionOracle,
    db: Arc<Database>,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Interceptor {
    pub fn new(
        oracle: PermissionOracle,
        db: Arc<Database>,
        store: Arc<dyn DocumentStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            oracle,
            db,
            store,
            timeout: config.document_timeout(),
        }
    }

    /// Submit an edit of `target` written against `base_revision`
    /// (`None` = the author is creating the page).
    pub async fn submit(
        &self,
        actor: &str,
        target: &str,
        base_revision: Option<&RevisionId>,
        proposed_text: &str,
        summary: &str,
    ) -> Result<Outcome, ModerationError> {
        if self.oracle.is_blocked(actor, target) {
            info!(actor, target, "submission refused: blocked");
            return Err(ModerationError::Blocked {
                actor: actor.to_string(),
                target: target.to_string(),
            });
        }

        if self.oracle.can_bypass_moderation(actor) {
            let revision = with_timeout(
                "apply_change",
                self.timeout,
                self.store
                    .apply_change(target, base_revision, proposed_text, summary),
            )
            .await?;
            info!(actor, target, revision = %revision, "submission applied directly");
            return Ok(Outcome::AppliedDirectly { revision });
        }

        let entry = self.db.insert_entry(&NewEntry {
            author: actor,
            target,
            base_revision,
            proposed_text,
            summary,
        })?;
        info!(entry_id = entry.id, actor, target, "submission queued");
        Ok(Outcome::Queued(entry.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PermissionsConfig;
    use crate::document::MemoryDocumentStore;
    use crate::models::{BlockSubject, EntryState};
    use crate::permissions::StaticRoles;

    struct Fixture {
        db: Arc<Database>,
        store: Arc<MemoryDocumentStore>,
        interceptor: Interceptor,
    }

    fn setup() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let roles = StaticRoles::new()
            .with("User 1", &["moderator", "automoderated"])
            .with("User 2", &["moderator"])
            .with("User 3", &["automoderated"]);
        let oracle = PermissionOracle::new(Arc::new(roles), db.clone(), &PermissionsConfig::default());
        let interceptor = Interceptor::new(oracle, db.clone(), store.clone(), &EngineConfig::default());
        Fixture {
            db,
            store,
            interceptor,
        }
    }

    #[tokio::test]
    async fn test_unprivileged_edit_is_queued() {
        let f = setup();
        let outcome = f
            .interceptor
            .submit("User 5", "Test page 1", None, "Hello, World!", "")
            .await
            .unwrap();
        let Outcome::Queued(id) = outcome else {
            panic!("expected queued, got {outcome:?}");
        };
        let entry = f.db.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.state, EntryState::Pending);
        assert!(!entry.conflict_flag);
        assert_eq!(f.store.revision_count("Test page 1"), 0);
    }

    #[tokio::test]
    async fn test_moderator_without_bypass_is_queued() {
        let f = setup();
        let outcome = f
            .interceptor
            .submit("User 2", "Test page 1", None, "text", "")
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Queued(_)));
    }

    #[tokio::test]
    async fn test_automoderated_edit_bypasses_queue() {
        let f = setup();
        let base = f.store.seed("Test page 1", "old");
        let outcome = f
            .interceptor
            .submit("User 3", "Test page 1", Some(&base), "new", "")
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::AppliedDirectly { .. }));
        assert_eq!(f.store.revision_count("Test page 1"), 2);
        assert_eq!(f.db.count_entries_by_state(EntryState::Pending).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bypass_against_stale_base_is_edit_conflict() {
        let f = setup();
        let base = f.store.seed("Test page 1", "old");
        f.store.seed("Test page 1", "newer");
        let err = f
            .interceptor
            .submit("User 3", "Test page 1", Some(&base), "mine", "")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "moderation-edit-conflict");
        assert_eq!(f.db.count_entries_by_state(EntryState::Pending).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blocked_author_or_target_creates_nothing() {
        let f = setup();
        f.db.insert_block(&BlockSubject::Author("User 5".into()), "User 1")
            .unwrap();
        f.db.insert_block(&BlockSubject::Target("Locked page".into()), "User 1")
            .unwrap();

        let err = f
            .interceptor
            .submit("User 5", "Test page 1", None, "x", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Blocked { .. }));

        let err = f
            .interceptor
            .submit("User 3", "Locked page", None, "x", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Blocked { .. }));

        assert_eq!(f.db.count_entries_by_state(EntryState::Pending).unwrap(), 0);
        assert_eq!(f.store.revision_count("Locked page"), 0);
    }
}
