//! Approval-time conflict check.
//!
//! The [`ConflictResolver`] compares the revision an entry was written
//! against with the document's current revision. When they differ it
//! computes a three-way merge for the reviewer, but it never decides that a
//! merge is safe to apply: any movement of the document is a conflict.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::merger::{MergeResult, Merger};
use crate::document::{with_timeout, DocumentStore};
use crate::errors::DocumentError;
use crate::models::{Revision, RevisionId};

/// Everything a reviewer needs to resolve a conflicted entry by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    /// Revision the author edited from (`None` = page did not exist).
    pub base_revision: Option<RevisionId>,
    /// Revision the document is at now (`None` = page is gone).
    pub current_revision: Option<RevisionId>,
    pub current_text: String,
    pub proposed_text: String,
    /// Merge of current and proposed over the base text. Advisory only.
    pub merge: MergeResult,
}

/// Result of [`ConflictResolver::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The document is still at the base revision.
    Clean { current: Option<Revision> },
    Conflict(ConflictReport),
}

/// Reads the live document through a [`DocumentStore`] under a deadline.
#[derive(Clone)]
pub struct ConflictResolver {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Check whether `proposed_text`, written against `base_revision`, can
    /// still be applied to `target` as-is.
    pub async fn check(
        &self,
        target: &str,
        base_revision: Option<&RevisionId>,
        proposed_text: &str,
    ) -> Result<CheckOutcome, DocumentError> {
        let current = with_timeout(
            "current_revision",
            self.timeout,
            self.store.current_revision(target),
        )
        .await?;

        let unchanged = match (base_revision, current.as_ref()) {
            (None, None) => true,
            (Some(base), Some(rev)) => &rev.id == base,
            _ => false,
        };
        if unchanged {
            debug!(target, base = ?base_revision.map(|b| b.as_str()), "document unchanged, clean");
            return Ok(CheckOutcome::Clean { current });
        }

        let ancestor = match base_revision {
            Some(base) => self.base_text(target, base).await?,
            None => String::new(),
        };
        let (current_revision, current_text) = match current {
            Some(rev) => (Some(rev.id), rev.text),
            None => (None, String::new()),
        };
        let merge = Merger::three_way_merge(&ancestor, &current_text, proposed_text);
        debug!(
            target,
            base = ?base_revision.map(|b| b.as_str()),
            current = ?current_revision.as_ref().map(|c| c.as_str()),
            overlapping = merge.has_conflicts,
            "document moved since base revision"
        );

        Ok(CheckOutcome::Conflict(ConflictReport {
            base_revision: base_revision.cloned(),
            current_revision,
            current_text,
            proposed_text: proposed_text.to_string(),
            merge,
        }))
    }

    /// Text of the base revision. A base the store no longer knows merges
    /// from an empty ancestor.
    async fn base_text(&self, target: &str, base: &RevisionId) -> Result<String, DocumentError> {
        let text = with_timeout(
            "revision_text",
            self.timeout,
            self.store.revision_text(target, base),
        )
        .await?;
        Ok(text.unwrap_or_else(|| {
            warn!(target, revision = %base, "base revision text missing, merging from empty ancestor");
            String::new()
        }))
    }
}
