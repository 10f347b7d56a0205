//! Permission oracle: who may bypass moderation, who may review, and who is
//! blocked.
//!
//! Group memberships come from a [`RoleSource`]; blocks come from the entry
//! store. All queries are infallible: an unknown actor simply has no groups,
//! and a block lookup that cannot be answered counts as blocked.

pub mod groups_file;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::config::PermissionsConfig;
use crate::db::Database;
use crate::models::BlockSubject;

pub use groups_file::GroupsFile;

/// Read-only source of group memberships.
pub trait RoleSource: Send + Sync {
    /// Groups `actor` belongs to. Unknown actors have none.
    fn groups_of(&self, actor: &str) -> HashSet<String>;
}

/// In-memory role source.
#[derive(Debug, Clone, Default)]
pub struct StaticRoles {
    groups: HashMap<String, HashSet<String>>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style membership registration.
    pub fn with(mut self, actor: &str, groups: &[&str]) -> Self {
        self.groups
            .entry(actor.to_string())
            .or_default()
            .extend(groups.iter().map(|g| g.to_string()));
        self
    }
}

impl RoleSource for StaticRoles {
    fn groups_of(&self, actor: &str) -> HashSet<String> {
        self.groups.get(actor).cloned().unwrap_or_default()
    }
}

/// Answers capability and block questions for actors.
#[derive(Clone)]
pub struct PermissionOracle {
    roles: Arc<dyn RoleSource>,
    db: Arc<Database>,
    review_groups: Vec<String>,
    bypass_groups: Vec<String>,
}

impl PermissionOracle {
    pub fn new(roles: Arc<dyn RoleSource>, db: Arc<Database>, config: &PermissionsConfig) -> Self {
        Self {
            roles,
            db,
            review_groups: config.review_groups.clone(),
            bypass_groups: config.bypass_groups.clone(),
        }
    }

    fn has_any(&self, actor: &str, wanted: &[String]) -> bool {
        let groups = self.roles.groups_of(actor);
        wanted.iter().any(|g| groups.contains(g))
    }

    /// Whether edits by `actor` are applied without review.
    pub fn can_bypass_moderation(&self, actor: &str) -> bool {
        self.has_any(actor, &self.bypass_groups)
    }

    /// Whether `actor` may approve, reject, merge and block.
    pub fn can_review(&self, actor: &str) -> bool {
        self.has_any(actor, &self.review_groups)
    }

    /// Whether `subject` has a standing block. Store failures count as blocked.
    pub fn is_subject_blocked(&self, subject: &BlockSubject) -> bool {
        match self.db.is_subject_blocked(subject) {
            Ok(blocked) => blocked,
            Err(e) => {
                warn!(subject = %subject, error = %e, "block lookup failed, treating as blocked");
                true
            }
        }
    }

    /// Whether `actor` is blocked from submitting to `target`.
    pub fn is_blocked(&self, actor: &str, target: &str) -> bool {
        self.is_subject_blocked(&BlockSubject::Author(actor.to_string()))
            || self.is_subject_blocked(&BlockSubject::Target(target.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> (PermissionOracle, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        db.initialize().unwrap();
        let roles = StaticRoles::new()
            .with("User 1", &["moderator", "automoderated"])
            .with("User 2", &["moderator"])
            .with("User 3", &["automoderated"])
            .with("User 4", &["rollback"]);
        let oracle = PermissionOracle::new(
            Arc::new(roles),
            db.clone(),
            &PermissionsConfig::default(),
        );
        (oracle, db)
    }

    #[test]
    fn test_capabilities_follow_groups() {
        let (oracle, _db) = oracle();
        assert!(oracle.can_review("User 1") && oracle.can_bypass_moderation("User 1"));
        assert!(oracle.can_review("User 2") && !oracle.can_bypass_moderation("User 2"));
        assert!(!oracle.can_review("User 3") && oracle.can_bypass_moderation("User 3"));
        assert!(!oracle.can_review("User 4") && !oracle.can_bypass_moderation("User 4"));
    }

    #[test]
    fn test_unknown_actor_is_unprivileged() {
        let (oracle, _db) = oracle();
        assert!(!oracle.can_review("nobody"));
        assert!(!oracle.can_bypass_moderation(""));
        assert!(!oracle.is_blocked("nobody", "Main Page"));
    }

    #[test]
    fn test_author_and_target_blocks() {
        let (oracle, db) = oracle();
        db.insert_block(&BlockSubject::Author("User 5".into()), "User 1")
            .unwrap();
        db.insert_block(&BlockSubject::Target("Protected".into()), "User 1")
            .unwrap();

        assert!(oracle.is_blocked("User 5", "Anything"));
        assert!(oracle.is_blocked("User 3", "Protected"));
        assert!(!oracle.is_blocked("User 3", "Anything"));
    }

    #[test]
    fn test_unreadable_block_store_fails_closed() {
        let (oracle, db) = oracle();
        db.conn().execute_batch("DROP TABLE blocks;").unwrap();
        assert!(oracle.is_blocked("User 3", "Anything"));
    }
}
