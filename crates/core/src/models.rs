//! Domain model types used throughout ModQueue.
//!
//! These types bridge the interceptor, the entry store, the action engine
//! and any presentation layer built on top of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Revisions
// ---------------------------------------------------------------------------

/// Opaque identifier of one document revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub String);

impl RevisionId {
    /// Allocate a fresh random revision id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The current state of a document: its revision id and full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Entry state machine
// ---------------------------------------------------------------------------

/// Lifecycle state of a queued entry.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Approved,
    Rejected,
    RejectedBatch,
    Merged,
    /// Administratively closed because its author or target is blocked.
    Blocked,
}

impl EntryState {
    pub const ALL: [EntryState; 6] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::RejectedBatch,
        Self::Merged,
        Self::Blocked,
    ];

    /// Parse the stored representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "rejected_batch" => Some(Self::RejectedBatch),
            "merged" => Some(Self::Merged),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }

    /// The folder an entry in this state is listed under.
    pub fn folder(self) -> Folder {
        match self {
            Self::Pending => Folder::Pending,
            Self::Approved => Folder::Approved,
            Self::Rejected | Self::RejectedBatch | Self::Blocked => Folder::Rejected,
            Self::Merged => Folder::Merged,
        }
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::RejectedBatch => write!(f, "rejected_batch"),
            Self::Merged => write!(f, "merged"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// Named view over entries, a projection of [`EntryState`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Folder {
    Pending,
    Approved,
    Rejected,
    Merged,
}

impl Folder {
    /// States whose entries are listed in this folder.
    pub fn states(self) -> &'static [EntryState] {
        match self {
            Self::Pending => &[EntryState::Pending],
            Self::Approved => &[EntryState::Approved],
            Self::Rejected => &[
                EntryState::Rejected,
                EntryState::RejectedBatch,
                EntryState::Blocked,
            ],
            Self::Merged => &[EntryState::Merged],
        }
    }

    pub fn from_str_val(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One queued change plus its resolution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub author: String,
    pub target: String,
    /// `None` when the author created a page that did not exist yet.
    pub base_revision: Option<RevisionId>,
    pub proposed_text: String,
    pub summary: String,
    pub state: EntryState,
    pub conflict_flag: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Document revision written by approve or merge.
    pub resolved_revision: Option<RevisionId>,
}

impl Entry {
    pub fn folder(&self) -> Folder {
        self.state.folder()
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }
}

/// Input for creating a new pending entry.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub author: &'a str,
    pub target: &'a str,
    pub base_revision: Option<&'a RevisionId>,
    pub proposed_text: &'a str,
    pub summary: &'a str,
}

// ---------------------------------------------------------------------------
// Derived action availability
// ---------------------------------------------------------------------------

/// Which actions a view layer may offer for one entry.
///
/// Computed purely from `state`, `conflict_flag` and whether the author is
/// blocked; never from rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLinks {
    pub show: bool,
    pub approve: bool,
    pub approve_all: bool,
    pub reject: bool,
    pub reject_all: bool,
    pub merge: bool,
    pub block: bool,
    pub unblock: bool,
}

impl ActionLinks {
    pub fn for_entry(entry: &Entry, author_blocked: bool) -> Self {
        let pending = entry.is_pending();
        Self {
            show: true,
            approve: pending && !entry.conflict_flag,
            approve_all: pending && !entry.conflict_flag,
            reject: pending,
            reject_all: pending,
            merge: pending && entry.conflict_flag,
            block: pending,
            unblock: pending && author_blocked,
        }
    }
}

/// Selects the pending entries a batch action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchFilter {
    All,
    Author(String),
    Target(String),
}

impl BatchFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::All => true,
            Self::Author(a) => &entry.author == a,
            Self::Target(t) => &entry.target == t,
        }
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// What a block record applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum BlockSubject {
    Author(String),
    Target(String),
}

impl BlockSubject {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Author(_) => "author",
            Self::Target(_) => "target",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Author(n) | Self::Target(n) => n,
        }
    }

    pub fn from_parts(kind: &str, name: String) -> Option<Self> {
        match kind {
            "author" => Some(Self::Author(name)),
            "target" => Some(Self::Target(name)),
            _ => None,
        }
    }
}

impl std::fmt::Display for BlockSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// A standing restriction on an author or a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: i64,
    pub subject: BlockSubject,
    pub blocked_by: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Moderation log
// ---------------------------------------------------------------------------

/// One row of the append-only moderation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub action: String,
    pub actor: String,
    pub entry_id: Option<i64>,
    pub target: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
