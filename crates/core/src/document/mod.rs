//! Document store boundary.
//!
//! The moderation core never owns page content. It reads and writes it
//! through a [`DocumentStore`], whose `apply_change` is a compare-and-set
//! on the base revision: a write against a revision that is no longer
//! current fails with [`DocumentError::StaleBase`] instead of overwriting.

pub mod memory;
pub mod sqlite;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DocumentError;
use crate::models::{Revision, RevisionId};

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Storage for the documents that entries propose changes to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current revision of `target`, or `None` if the page does not exist.
    async fn current_revision(&self, target: &str) -> Result<Option<Revision>, DocumentError>;

    /// Text of a historical revision of `target`.
    async fn revision_text(
        &self,
        target: &str,
        revision: &RevisionId,
    ) -> Result<Option<String>, DocumentError>;

    /// Write `text` as the new current revision of `target`, provided the
    /// current revision is still `base` (`None` = page must not exist).
    async fn apply_change(
        &self,
        target: &str,
        base: Option<&RevisionId>,
        text: &str,
        summary: &str,
    ) -> Result<RevisionId, DocumentError>;
}

/// Run a document store call under a deadline. An elapsed deadline becomes
/// [`DocumentError::Timeout`], never a conflict.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, DocumentError>
where
    F: Future<Output = Result<T, DocumentError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = timeout.as_millis() as u64, "document store call timed out");
            Err(DocumentError::Timeout {
                operation,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
