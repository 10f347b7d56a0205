//! Error types for the ModQueue core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

// ---------------------------------------------------------------------------
// Moderation errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the interceptor and the action engine.
///
/// Every variant except `Database` maps onto a stable error code (see
/// [`ModerationError::code`]) that presentation layers can match on.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The actor lacks the capability required for the operation.
    #[error("actor '{actor}' is not allowed to {action}")]
    Unauthorized { actor: String, action: String },

    /// Submission refused because the author or the target is blocked.
    #[error("submission by '{actor}' to '{target}' is blocked")]
    Blocked { actor: String, target: String },

    /// The target document changed since the entry's base revision.
    #[error("edit conflict on '{target}' (entry {entry_id:?})")]
    EditConflict {
        entry_id: Option<i64>,
        target: String,
    },

    /// The operation is not valid for the entry's current state or flags.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The entry does not exist.
    #[error("entry {0} not found")]
    NotFound(i64),

    /// A document store call exceeded its deadline.
    #[error("document store timed out after {timeout_ms} ms during {operation}")]
    StorageTimeout { operation: String, timeout_ms: u64 },

    /// The document store reported a failure.
    #[error("document store unavailable: {0}")]
    StorageUnavailable(String),

    /// The entry store failed.
    #[error("entry store error: {0}")]
    Database(#[from] DatabaseError),
}

impl ModerationError {
    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "moderation-unauthorized",
            Self::Blocked { .. } => "moderation-blocked",
            Self::EditConflict { .. } => "moderation-edit-conflict",
            Self::InvalidState(_) => "moderation-invalid-state",
            Self::NotFound(_) => "moderation-edit-not-found",
            Self::StorageTimeout { .. } => "moderation-storage-timeout",
            Self::StorageUnavailable(_) | Self::Database(_) => "moderation-storage-unavailable",
        }
    }

    /// Whether the caller may retry the same call later with a chance of success.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageTimeout { .. } | Self::StorageUnavailable(_) | Self::Database(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Document store errors
// ---------------------------------------------------------------------------

/// Errors reported by a [`DocumentStore`](crate::document::DocumentStore).
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Compare-and-set failed: the document moved past the given base.
    #[error("stale base revision for '{target}': expected {expected}, found {actual}")]
    StaleBase {
        target: String,
        expected: String,
        actual: String,
    },

    /// The backing store could not serve the request.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its deadline.
    #[error("document store call '{operation}' timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Database error in a SQLite-backed store.
    #[error("document database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl From<DocumentError> for ModerationError {
    /// `StaleBase` has no entry context here; callers that can attach one
    /// match it before converting.
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::StaleBase { target, .. } => Self::EditConflict {
                entry_id: None,
                target,
            },
            DocumentError::Timeout {
                operation,
                timeout_ms,
            } => Self::StorageTimeout {
                operation: operation.to_string(),
                timeout_ms,
            },
            DocumentError::Unavailable(detail) => Self::StorageUnavailable(detail),
            DocumentError::DatabaseError(e) => Self::StorageUnavailable(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Permission errors
// ---------------------------------------------------------------------------

/// Errors from loading role sources. Queries themselves never fail.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The groups file could not be loaded.
    #[error("groups file error at '{path}': {detail}")]
    GroupsFileError { path: String, detail: String },

    /// TOML parse error when reading the groups file.
    #[error("groups file parse error: {0}")]
    ParseError(String),

    /// Generic I/O error.
    #[error("groups file I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A stored value could not be decoded.
    #[error("corrupt {entity} row: {detail}")]
    Corrupt { entity: String, detail: String },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ModerationError::NotFound(42);
        assert_eq!(err.to_string(), "entry 42 not found");

        let err = ModerationError::Blocked {
            actor: "mallory".into(),
            target: "Main Page".into(),
        };
        assert!(err.to_string().contains("mallory"));

        let err = DocumentError::StaleBase {
            target: "Main Page".into(),
            expected: "r1".into(),
            actual: "r2".into(),
        };
        assert!(err.to_string().contains("stale base"));

        let err = ConfigError::InvalidValue {
            field: "queue.folder_limit".into(),
            detail: "must be > 0".into(),
        };
        assert!(err.to_string().contains("queue.folder_limit"));
    }

    #[test]
    fn test_codes_are_distinct_for_conflict_and_timeout() {
        let conflict = ModerationError::EditConflict {
            entry_id: Some(1),
            target: "Page".into(),
        };
        let timeout = ModerationError::StorageTimeout {
            operation: "apply_change".into(),
            timeout_ms: 10,
        };
        assert_eq!(conflict.code(), "moderation-edit-conflict");
        assert_ne!(conflict.code(), timeout.code());
        assert!(timeout.is_transient());
        assert!(!conflict.is_transient());
    }

    #[test]
    fn test_document_errors_map_to_moderation_errors() {
        let err: ModerationError = DocumentError::Timeout {
            operation: "current_revision",
            timeout_ms: 5,
        }
        .into();
        assert!(matches!(err, ModerationError::StorageTimeout { timeout_ms: 5, .. }));

        let err: ModerationError = DocumentError::Unavailable("down".into()).into();
        assert!(matches!(err, ModerationError::StorageUnavailable(_)));

        let err: ModerationError = DocumentError::StaleBase {
            target: "Page".into(),
            expected: "r1".into(),
            actual: "r2".into(),
        }
        .into();
        assert_eq!(err.code(), "moderation-edit-conflict");
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err: CoreError = ModerationError::NotFound(1).into();
        assert!(matches!(err, CoreError::Moderation(_)));

        let db_err = DatabaseError::NotFound {
            entity: "entry".into(),
            id: "7".into(),
        };
        let err: CoreError = CoreError::Database(db_err);
        assert!(matches!(err, CoreError::Database(_)));
    }
}
