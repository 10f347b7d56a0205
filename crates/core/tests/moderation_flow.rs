//! End-to-end moderation scenarios.
//!
//! These tests drive the public API only: a file-backed SQLite entry store,
//! the SQLite document store on the same database, and the `User 1..5`
//! accounts with the group memberships below.
//!
//! | user   | groups                      |
//! |--------|-----------------------------|
//! | User 1 | moderator, automoderated    |
//! | User 2 | moderator                   |
//! | User 3 | automoderated               |
//! | User 4 | rollback                    |
//! | User 5 | (none)                      |

use std::sync::Arc;

use tempfile::TempDir;

use modqueue_core::config::AppConfig;
use modqueue_core::db::Database;
use modqueue_core::document::{DocumentStore, SqliteDocumentStore};
use modqueue_core::engine::ActionEngine;
use modqueue_core::errors::ModerationError;
use modqueue_core::interceptor::{Interceptor, Outcome};
use modqueue_core::models::{ActionLinks, BatchFilter, BlockSubject, EntryState, Folder};
use modqueue_core::permissions::{PermissionOracle, StaticRoles};
use modqueue_core::snapshot;

// ===========================================================================
// Helpers
// ===========================================================================

struct Harness {
    _dir: TempDir,
    db: Arc<Database>,
    pages: Arc<SqliteDocumentStore>,
    interceptor: Interceptor,
    engine: ActionEngine,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.store.data_dir = dir.path().to_path_buf();
    config.validate().unwrap();

    let db = Arc::new(Database::new(config.store.database_path()).unwrap());
    db.initialize().unwrap();
    let pages = Arc::new(SqliteDocumentStore::new(db.clone()));

    let roles = StaticRoles::new()
        .with("User 1", &["moderator", "automoderated"])
        .with("User 2", &["moderator"])
        .with("User 3", &["automoderated"])
        .with("User 4", &["rollback"]);
    let oracle = PermissionOracle::new(Arc::new(roles), db.clone(), &config.permissions);

    let interceptor = Interceptor::new(oracle.clone(), db.clone(), pages.clone(), &config.engine);
    let engine = ActionEngine::new(
        db.clone(),
        oracle,
        pages.clone(),
        &config.engine,
        &config.queue,
    );

    Harness {
        _dir: dir,
        db,
        pages,
        interceptor,
        engine,
    }
}

async fn submit_queued(h: &Harness, author: &str, target: &str, text: &str) -> i64 {
    let base = h
        .pages
        .current_revision(target)
        .await
        .unwrap()
        .map(|r| r.id);
    match h
        .interceptor
        .submit(author, target, base.as_ref(), text, "Edit by the test suite")
        .await
        .unwrap()
    {
        Outcome::Queued(id) => id,
        other => panic!("expected the edit to be queued, got {other:?}"),
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[tokio::test]
async fn three_way_conflict_leaves_entry_pending_with_merge_link() {
    let h = harness();
    let base_text = "Normal line 1\nNot very interesting line 2\nNot very interesting line 3\nNormal line 4\n";
    let Outcome::AppliedDirectly { revision: base } = h
        .interceptor
        .submit("User 1", "Test page 1", None, base_text, "create")
        .await
        .unwrap()
    else {
        panic!("User 1 bypasses moderation");
    };

    let entry_id = match h
        .interceptor
        .submit("User 5", "Test page 1", Some(&base), "Normal line 1\nNormal line 4\n", "")
        .await
        .unwrap()
    {
        Outcome::Queued(id) => id,
        other => panic!("expected queued, got {other:?}"),
    };

    h.interceptor
        .submit(
            "User 3",
            "Test page 1",
            Some(&base),
            "Normal line 1\nJust made line 2 more interesting\nNot very interesting line 3\nNormal line 4\n",
            "",
        )
        .await
        .unwrap();

    let pending_before = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();
    let err = h.engine.approve(entry_id, "User 2").await.unwrap_err();
    let pending_after = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();
    assert!(snapshot::diff(&pending_before, &pending_after).is_empty());
    assert_eq!(pending_after.ids(), vec![entry_id]);
    assert!(matches!(
        err,
        ModerationError::EditConflict {
            entry_id: Some(id),
            ..
        } if id == entry_id
    ));
    assert_eq!(err.code(), "moderation-edit-conflict");

    let entry = h.db.get_entry(entry_id).unwrap().unwrap();
    assert_eq!(entry.state, EntryState::Pending);
    assert!(entry.conflict_flag);

    let links = h.engine.links_for(&entry);
    assert!(links.merge && links.reject && links.reject_all && links.block);
    assert!(!links.approve && !links.approve_all);

    // The author's text never reached the page.
    let current = h.pages.current_revision("Test page 1").await.unwrap().unwrap();
    assert!(current.text.contains("Just made line 2 more interesting"));
    assert_eq!(h.pages.history("Test page 1").unwrap().len(), 2);
}

#[tokio::test]
async fn clean_queue_then_approve_moves_entry_out_of_pending() {
    let h = harness();
    let before = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();

    let id = submit_queued(&h, "User 5", "Test page 2", "Hello, World!").await;
    let queued = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();

    let d = snapshot::diff(&before, &queued);
    assert_eq!(d.added.iter().map(|e| e.id).collect::<Vec<_>>(), vec![id]);
    assert!(d.removed.is_empty());

    let approved = h.engine.approve(id, "User 1").await.unwrap();
    assert_eq!(approved.state, EntryState::Approved);
    assert_eq!(
        ActionLinks::for_entry(&approved, false),
        ActionLinks {
            show: true,
            ..ActionLinks::default()
        }
    );

    let after = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();
    let d = snapshot::diff(&queued, &after);
    assert!(d.added.is_empty());
    assert_eq!(d.removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![id]);

    let approved_folder = h.engine.list_folder("User 2", Folder::Approved, None).unwrap();
    assert_eq!(approved_folder.ids(), vec![id]);
    let page = h.pages.current_revision("Test page 2").await.unwrap().unwrap();
    assert_eq!(page.text, "Hello, World!");
}

#[tokio::test]
async fn batch_reject_reclassifies_without_deleting() {
    let h = harness();
    let mut ids = Vec::new();
    for text in ["one", "two", "three"] {
        ids.push(submit_queued(&h, "User 5", "Test page 3", text).await);
    }
    let queued = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();
    assert_eq!(queued.len(), 3);

    let report = h
        .engine
        .reject_all("User 2", &BatchFilter::Target("Test page 3".into()))
        .await
        .unwrap();
    assert_eq!(report.succeeded, ids);
    assert!(report.failed.is_empty());

    for id in &ids {
        let entry = h.db.get_entry(*id).unwrap().unwrap();
        assert_eq!(entry.state, EntryState::RejectedBatch);
        assert_eq!(entry.resolved_by.as_deref(), Some("User 2"));
    }

    let after = h.engine.list_folder("User 2", Folder::Pending, None).unwrap();
    let d = snapshot::diff(&queued, &after);
    assert_eq!(d.removed.len(), 3);

    // Newest first, as the folder listing shows them.
    let rejected = h.engine.list_folder("User 2", Folder::Rejected, None).unwrap();
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(rejected.ids(), expected);
}

#[tokio::test]
async fn bypass_and_block_rules() {
    let h = harness();

    for actor in ["User 1", "User 3"] {
        let outcome = h
            .interceptor
            .submit(actor, &format!("{actor} page"), None, "text", "")
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::AppliedDirectly { .. }));
    }
    for actor in ["User 2", "User 4", "User 5"] {
        submit_queued(&h, actor, &format!("{actor} page"), "text").await;
    }
    assert_eq!(h.db.count_entries_by_state(EntryState::Pending).unwrap(), 3);

    h.engine
        .block("User 2", &BlockSubject::Author("User 3".into()))
        .unwrap();
    let err = h
        .interceptor
        .submit("User 3", "Another page", None, "text", "")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "moderation-blocked");
    assert!(h.pages.current_revision("Another page").await.unwrap().is_none());
    assert_eq!(h.db.count_entries_by_state(EntryState::Pending).unwrap(), 3);
}

#[tokio::test]
async fn merge_resolves_a_conflicted_entry() {
    let h = harness();
    let Outcome::AppliedDirectly { revision: base } = h
        .interceptor
        .submit("User 1", "Test page 4", None, "a\nb\nc\n", "")
        .await
        .unwrap()
    else {
        panic!("User 1 bypasses moderation");
    };
    let id = submit_queued(&h, "User 5", "Test page 4", "a\nB\nc\n").await;
    h.interceptor
        .submit("User 1", "Test page 4", Some(&base), "a\nb\nC\n", "")
        .await
        .unwrap();

    assert!(h.engine.approve(id, "User 2").await.is_err());
    let view = h.engine.show(id, "User 2").await.unwrap();
    assert!(view.links.merge);

    let merged = h.engine.merge(id, "User 2", "a\nB\nC\n").await.unwrap();
    assert_eq!(merged.state, EntryState::Merged);
    let page = h.pages.current_revision("Test page 4").await.unwrap().unwrap();
    assert_eq!(page.text, "a\nB\nC\n");

    let log = h.engine.moderation_log("User 2", 10).unwrap();
    assert_eq!(log[0].action, "merge");
}
