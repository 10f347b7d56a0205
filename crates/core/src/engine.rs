//! Reviewer actions over queued entries.
//!
//! The [`ActionEngine`] owns every transition out of `Pending`:
//!
//! 1. Check that the actor may review.
//! 2. Take the per-target lock, then re-read the entry under it.
//! 3. For approve, run the conflict check; for merge, read the current
//!    revision. Apply the text through the document store's compare-and-set.
//! 4. Compare-and-set the entry out of `Pending` and append to the
//!    moderation log.
//!
//! A call either completes all of its steps or leaves the entry as it was.
//! The only write that can happen before a failure is the conflict flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, QueueConfig};
use crate::conflict::{CheckOutcome, ConflictReport, ConflictResolver, MergeResult, Merger};
use crate::db::Database;
use crate::document::{with_timeout, DocumentStore};
use crate::errors::{DocumentError, ModerationError};
use crate::models::{
    ActionLinks, BatchFilter, BlockRecord, BlockSubject, Entry, EntryState, Folder, LogEntry,
    RevisionId,
};
use crate::permissions::PermissionOracle;
use crate::snapshot::FolderSnapshot;

// ---------------------------------------------------------------------------
// Per-target locks
// ---------------------------------------------------------------------------

/// One async mutex per target, created on demand.
///
/// Entries for targets nobody holds are dropped on the next acquisition, so
/// the map only grows with the number of targets locked at the same time.
#[derive(Debug, Default)]
struct TargetLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TargetLocks {
    fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `target`.
    async fn lock(&self, target: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.retain(|_, m| Arc::strong_count(m) > 1);
            map.entry(target.to_string()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Number of targets currently tracked.
    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Per-entry outcome of a batch action. Batches are not atomic.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<i64>,
    /// Entries left `Pending` with the conflict flag set.
    pub conflicted: Vec<i64>,
    pub failed: Vec<(i64, ModerationError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.conflicted.len() + self.failed.len()
    }
}

/// Reviewer view of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub entry: Entry,
    pub links: ActionLinks,
    pub author_blocked: bool,
    /// Unified diff from the base text to the proposed text.
    pub diff: String,
    /// Merge of the current page and the proposed text, for a pending
    /// entry whose page has moved.
    pub merge_preview: Option<MergeResult>,
}

/// Outcome of one attempt to write an entry's text.
enum Applied {
    Written(RevisionId),
    Conflict(Option<ConflictReport>),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ActionEngine {
    db: Arc<Database>,
    oracle: PermissionOracle,
    store: Arc<dyn DocumentStore>,
    resolver: ConflictResolver,
    locks: TargetLocks,
    timeout: Duration,
    stale_base_retries: u32,
    folder_limit: u32,
}

impl ActionEngine {
    pub fn new(
        db: Arc<Database>,
        oracle: PermissionOracle,
        store: Arc<dyn DocumentStore>,
        engine: &EngineConfig,
        queue: &QueueConfig,
    ) -> Self {
        let timeout = engine.document_timeout();
        Self {
            resolver: ConflictResolver::new(store.clone(), timeout),
            db,
            oracle,
            store,
            locks: TargetLocks::new(),
            timeout,
            stale_base_retries: engine.stale_base_retries,
            folder_limit: queue.folder_limit,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // -----------------------------------------------------------------------
    // Approve
    // -----------------------------------------------------------------------

    /// Apply a pending entry's proposed text if the document has not moved
    /// since its base revision.
    ///
    /// If it has moved, the entry stays `Pending` with its conflict flag set
    /// and the call fails with [`ModerationError::EditConflict`].
    pub async fn approve(&self, entry_id: i64, actor: &str) -> Result<Entry, ModerationError> {
        self.require_reviewer(actor, "approve")?;
        let (entry, _guard) = self.lock_pending(entry_id).await?;

        let mut retries_left = self.stale_base_retries;
        let revision = loop {
            match self.try_approve(&entry).await? {
                Applied::Written(revision) => break revision,
                Applied::Conflict(None) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(entry_id, target = %entry.target, "document moved during approve, re-checking");
                }
                Applied::Conflict(report) => {
                    return Err(self.flag_conflict(&entry, actor, report.as_ref()));
                }
            }
        };

        self.finish(&entry, EntryState::Approved, actor, Some(&revision), "approve")
    }

    async fn try_approve(&self, entry: &Entry) -> Result<Applied, ModerationError> {
        let outcome = self
            .resolver
            .check(&entry.target, entry.base_revision.as_ref(), &entry.proposed_text)
            .await
            .map_err(|e| storage_error(entry, e))?;

        let current = match outcome {
            CheckOutcome::Clean { current } => current,
            CheckOutcome::Conflict(report) => return Ok(Applied::Conflict(Some(report))),
        };
        self.write(
            entry,
            current.as_ref().map(|r| &r.id),
            &entry.proposed_text,
        )
        .await
    }

    /// Approve every pending entry matching `filter`, oldest first.
    ///
    /// Conflicts do not stop the batch. Entries already flagged as
    /// conflicted are checked again.
    pub async fn approve_all(
        &self,
        actor: &str,
        filter: &BatchFilter,
    ) -> Result<BatchReport, ModerationError> {
        self.require_reviewer(actor, "approve all")?;
        let entries = self.db.list_pending(filter)?;
        let mut report = BatchReport::default();

        for entry in entries {
            match self.approve(entry.id, actor).await {
                Ok(_) => report.succeeded.push(entry.id),
                Err(ModerationError::EditConflict { .. }) => report.conflicted.push(entry.id),
                Err(e) => {
                    debug!(entry_id = entry.id, error = %e, "approve_all: entry failed");
                    report.failed.push((entry.id, e));
                }
            }
        }

        info!(
            actor,
            succeeded = report.succeeded.len(),
            conflicted = report.conflicted.len(),
            failed = report.failed.len(),
            "approve_all finished"
        );
        self.log(
            "approve_all",
            actor,
            None,
            None,
            json!({
                "filter": filter_json(filter),
                "succeeded": report.succeeded,
                "conflicted": report.conflicted,
            }),
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Reject
    // -----------------------------------------------------------------------

    /// Reject a pending entry. No conflict check is made.
    pub async fn reject(&self, entry_id: i64, actor: &str) -> Result<Entry, ModerationError> {
        self.require_reviewer(actor, "reject")?;
        let (entry, _guard) = self.lock_pending(entry_id).await?;
        self.finish(&entry, EntryState::Rejected, actor, None, "reject")
    }

    /// Reject every pending entry matching `filter` as one batch.
    pub async fn reject_all(
        &self,
        actor: &str,
        filter: &BatchFilter,
    ) -> Result<BatchReport, ModerationError> {
        self.require_reviewer(actor, "reject all")?;
        let entries = self.db.list_pending(filter)?;
        let mut report = BatchReport::default();

        for entry in entries {
            let result = async {
                let (entry, _guard) = self.lock_pending(entry.id).await?;
                self.transition(&entry, EntryState::RejectedBatch, actor, None)
            }
            .await;
            match result {
                Ok(()) => report.succeeded.push(entry.id),
                Err(e) => report.failed.push((entry.id, e)),
            }
        }

        info!(
            actor,
            rejected = report.succeeded.len(),
            failed = report.failed.len(),
            "reject_all finished"
        );
        self.log(
            "reject_all",
            actor,
            None,
            None,
            json!({ "filter": filter_json(filter), "rejected": report.succeeded }),
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Resolve a conflicted entry with reviewer-supplied text, written on top
    /// of the document's current revision.
    pub async fn merge(
        &self,
        entry_id: i64,
        actor: &str,
        merged_text: &str,
    ) -> Result<Entry, ModerationError> {
        self.require_reviewer(actor, "merge")?;
        let (entry, _guard) = self.lock_pending(entry_id).await?;
        if !entry.conflict_flag {
            return Err(ModerationError::InvalidState(format!(
                "entry {entry_id} has no conflict to merge"
            )));
        }

        let mut retries_left = self.stale_base_retries;
        let revision = loop {
            let current = with_timeout(
                "current_revision",
                self.timeout,
                self.store.current_revision(&entry.target),
            )
            .await
            .map_err(|e| storage_error(&entry, e))?;

            match self
                .write(&entry, current.as_ref().map(|r| &r.id), merged_text)
                .await?
            {
                Applied::Written(revision) => break revision,
                Applied::Conflict(_) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(entry_id, target = %entry.target, "document moved during merge, re-reading");
                }
                Applied::Conflict(_) => return Err(edit_conflict(&entry)),
            }
        };

        self.finish(&entry, EntryState::Merged, actor, Some(&revision), "merge")
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Block an author or a target from further submissions.
    pub fn block(
        &self,
        actor: &str,
        subject: &BlockSubject,
    ) -> Result<BlockRecord, ModerationError> {
        self.require_reviewer(actor, "block")?;
        let record = self
            .db
            .insert_block(subject, actor)?
            .ok_or_else(|| ModerationError::InvalidState(format!("{subject} is already blocked")))?;
        info!(actor, subject = %subject, "blocked");
        self.log("block", actor, None, None, json!({ "subject": subject }));
        Ok(record)
    }

    /// Lift a block.
    pub fn unblock(&self, actor: &str, subject: &BlockSubject) -> Result<(), ModerationError> {
        self.require_reviewer(actor, "unblock")?;
        if !self.db.delete_block(subject)? {
            return Err(ModerationError::InvalidState(format!(
                "{subject} is not blocked"
            )));
        }
        info!(actor, subject = %subject, "unblocked");
        self.log("unblock", actor, None, None, json!({ "subject": subject }));
        Ok(())
    }

    /// Close a pending entry whose author or target is blocked.
    pub async fn close_blocked(&self, entry_id: i64, actor: &str) -> Result<Entry, ModerationError> {
        self.require_reviewer(actor, "close blocked entries")?;
        let (entry, _guard) = self.lock_pending(entry_id).await?;
        if !self.oracle.is_blocked(&entry.author, &entry.target) {
            return Err(ModerationError::InvalidState(format!(
                "neither '{}' nor '{}' is blocked",
                entry.author, entry.target
            )));
        }
        self.finish(&entry, EntryState::Blocked, actor, None, "close_blocked")
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// Entry, available actions and a diff from its base text.
    pub async fn show(&self, entry_id: i64, actor: &str) -> Result<EntryView, ModerationError> {
        self.require_reviewer(actor, "view entries")?;
        let entry = self.load(entry_id)?;

        let base_text = match &entry.base_revision {
            Some(base) => with_timeout(
                "revision_text",
                self.timeout,
                self.store.revision_text(&entry.target, base),
            )
            .await
            .map_err(|e| storage_error(&entry, e))?
            .unwrap_or_default(),
            None => String::new(),
        };
        let diff = Merger::unified_diff(&base_text, &entry.proposed_text);
        let author_blocked = self.author_blocked(&entry);

        let merge_preview = if entry.state == EntryState::Pending && entry.conflict_flag {
            match self
                .resolver
                .check(&entry.target, entry.base_revision.as_ref(), &entry.proposed_text)
                .await
                .map_err(|e| storage_error(&entry, e))?
            {
                CheckOutcome::Conflict(report) => Some(report.merge),
                CheckOutcome::Clean { .. } => None,
            }
        } else {
            None
        };

        Ok(EntryView {
            links: ActionLinks::for_entry(&entry, author_blocked),
            author_blocked,
            diff,
            merge_preview,
            entry,
        })
    }

    /// Snapshot of one folder, newest first. `limit` defaults to the
    /// configured folder limit.
    pub fn list_folder(
        &self,
        actor: &str,
        folder: Folder,
        limit: Option<u32>,
    ) -> Result<FolderSnapshot, ModerationError> {
        self.require_reviewer(actor, "list entries")?;
        let entries = self
            .db
            .list_folder(folder, limit.unwrap_or(self.folder_limit))?;
        Ok(FolderSnapshot::new(folder, entries))
    }

    /// Action links for an entry as a folder listing would show them.
    pub fn links_for(&self, entry: &Entry) -> ActionLinks {
        ActionLinks::for_entry(entry, self.author_blocked(entry))
    }

    pub fn list_blocks(&self, actor: &str) -> Result<Vec<BlockRecord>, ModerationError> {
        self.require_reviewer(actor, "list blocks")?;
        Ok(self.db.list_blocks()?)
    }

    /// Most recent moderation-log rows, newest first.
    pub fn moderation_log(&self, actor: &str, limit: u32) -> Result<Vec<LogEntry>, ModerationError> {
        self.require_reviewer(actor, "read the moderation log")?;
        Ok(self.db.list_log(limit)?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_reviewer(&self, actor: &str, action: &str) -> Result<(), ModerationError> {
        if self.oracle.can_review(actor) {
            Ok(())
        } else {
            debug!(actor, action, "refused: not a reviewer");
            Err(ModerationError::Unauthorized {
                actor: actor.to_string(),
                action: action.to_string(),
            })
        }
    }

    fn load(&self, entry_id: i64) -> Result<Entry, ModerationError> {
        self.db
            .get_entry(entry_id)?
            .ok_or(ModerationError::NotFound(entry_id))
    }

    /// Lock the entry's target and return the entry as read under the lock.
    async fn lock_pending(
        &self,
        entry_id: i64,
    ) -> Result<(Entry, OwnedMutexGuard<()>), ModerationError> {
        let target = self.load(entry_id)?.target;
        let guard = self.locks.lock(&target).await;
        let entry = self.load(entry_id)?;
        if !entry.is_pending() {
            return Err(ModerationError::InvalidState(format!(
                "entry {entry_id} is already {}",
                entry.state
            )));
        }
        Ok((entry, guard))
    }

    /// Compare-and-set `text` onto the document at `base`.
    async fn write(
        &self,
        entry: &Entry,
        base: Option<&RevisionId>,
        text: &str,
    ) -> Result<Applied, ModerationError> {
        let result = with_timeout(
            "apply_change",
            self.timeout,
            self.store
                .apply_change(&entry.target, base, text, &entry.summary),
        )
        .await;
        match result {
            Ok(revision) => Ok(Applied::Written(revision)),
            Err(DocumentError::StaleBase { .. }) => Ok(Applied::Conflict(None)),
            Err(e) => Err(storage_error(entry, e)),
        }
    }

    /// Set the conflict flag and build the error returned to the caller.
    fn flag_conflict(
        &self,
        entry: &Entry,
        actor: &str,
        report: Option<&ConflictReport>,
    ) -> ModerationError {
        match self.db.set_conflict_flag(entry.id) {
            Ok(true) => {}
            Ok(false) => warn!(entry_id = entry.id, "conflict flag not set: entry left pending state"),
            Err(e) => return e.into(),
        }
        info!(
            entry_id = entry.id,
            actor,
            target = %entry.target,
            overlapping = report.map(|r| r.merge.has_conflicts),
            "edit conflict"
        );
        edit_conflict(entry)
    }

    fn transition(
        &self,
        entry: &Entry,
        to: EntryState,
        actor: &str,
        revision: Option<&RevisionId>,
    ) -> Result<(), ModerationError> {
        if !self.db.transition_entry(entry.id, to, actor, revision)? {
            return Err(ModerationError::InvalidState(format!(
                "entry {} is no longer pending",
                entry.id
            )));
        }
        info!(entry_id = entry.id, actor, target = %entry.target, state = %to, "entry resolved");
        Ok(())
    }

    fn finish(
        &self,
        entry: &Entry,
        to: EntryState,
        actor: &str,
        revision: Option<&RevisionId>,
        action: &str,
    ) -> Result<Entry, ModerationError> {
        self.transition(entry, to, actor, revision)?;
        self.log(
            action,
            actor,
            Some(entry.id),
            Some(&entry.target),
            json!({ "author": entry.author, "revision": revision }),
        );
        self.load(entry.id)
    }

    fn author_blocked(&self, entry: &Entry) -> bool {
        self.oracle
            .is_subject_blocked(&BlockSubject::Author(entry.author.clone()))
    }

    /// Append to the moderation log. The action has already taken effect, so
    /// a failed append is logged rather than returned.
    fn log(
        &self,
        action: &str,
        actor: &str,
        entry_id: Option<i64>,
        target: Option<&str>,
        details: serde_json::Value,
    ) {
        if let Err(e) = self.db.insert_log(action, actor, entry_id, target, &details) {
            warn!(action, actor, error = %e, "failed to append moderation log");
        }
    }
}

fn edit_conflict(entry: &Entry) -> ModerationError {
    ModerationError::EditConflict {
        entry_id: Some(entry.id),
        target: entry.target.clone(),
    }
}

fn storage_error(entry: &Entry, err: DocumentError) -> ModerationError {
    match err {
        DocumentError::StaleBase { .. } => edit_conflict(entry),
        other => other.into(),
    }
}

fn filter_json(filter: &BatchFilter) -> serde_json::Value {
    match filter {
        BatchFilter::All => json!("all"),
        BatchFilter::Author(a) => json!({ "author": a }),
        BatchFilter::Target(t) => json!({ "target": t }),
    }
}
