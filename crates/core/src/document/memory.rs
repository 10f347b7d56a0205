//! In-memory [`DocumentStore`], used by tests and by embedders that keep
//! their pages elsewhere and only need the moderation core.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::DocumentStore;
use crate::errors::DocumentError;
use crate::models::{Revision, RevisionId};

#[derive(Debug, Default)]
struct Page {
    /// Every revision ever written, oldest first. The last one is current.
    history: Vec<Revision>,
}

#[derive(Debug, Default)]
struct Inner {
    pages: HashMap<String, Page>,
    latency: Option<Duration>,
    unavailable: bool,
}

/// Thread-safe in-memory page store with full revision history.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write a revision unconditionally and return its id.
    pub fn seed(&self, target: &str, text: &str) -> RevisionId {
        let id = RevisionId::generate();
        self.lock()
            .pages
            .entry(target.to_string())
            .or_default()
            .history
            .push(Revision {
                id: id.clone(),
                text: text.to_string(),
            });
        id
    }

    /// Delay every call by `latency` (simulates a slow backend).
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Make every call fail with [`DocumentError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Number of revisions written to `target`.
    pub fn revision_count(&self, target: &str) -> usize {
        self.lock()
            .pages
            .get(target)
            .map(|p| p.history.len())
            .unwrap_or(0)
    }

    async fn simulate_backend(&self) -> Result<(), DocumentError> {
        let (latency, unavailable) = {
            let inner = self.lock();
            (inner.latency, inner.unavailable)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(DocumentError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn current_revision(&self, target: &str) -> Result<Option<Revision>, DocumentError> {
        self.simulate_backend().await?;
        Ok(self
            .lock()
            .pages
            .get(target)
            .and_then(|p| p.history.last().cloned()))
    }

    async fn revision_text(
        &self,
        target: &str,
        revision: &RevisionId,
    ) -> Result<Option<String>, DocumentError> {
        self.simulate_backend().await?;
        Ok(self.lock().pages.get(target).and_then(|p| {
            p.history
                .iter()
                .find(|r| &r.id == revision)
                .map(|r| r.text.clone())
        }))
    }

    async fn apply_change(
        &self,
        target: &str,
        base: Option<&RevisionId>,
        text: &str,
        _summary: &str,
    ) -> Result<RevisionId, DocumentError> {
        self.simulate_backend().await?;
        let mut inner = self.lock();
        let page = inner.pages.entry(target.to_string()).or_default();
        let current = page.history.last().map(|r| &r.id);
        if current != base {
            return Err(DocumentError::StaleBase {
                target: target.to_string(),
                expected: base.map(|b| b.to_string()).unwrap_or_else(|| "<none>".into()),
                actual: current
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "<none>".into()),
            });
        }
        let id = RevisionId::generate();
        page.history.push(Revision {
            id: id.clone(),
            text: text.to_string(),
        });
        debug!(target, revision = %id, "memory store applied change");
        Ok(id)
    }
}
