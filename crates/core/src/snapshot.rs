//! Folder snapshots and the id-based differ over them.
//!
//! A snapshot is a read of one folder at one moment. Diffing two snapshots
//! of the same folder tells a reviewer which entries arrived and which left.
//!
//! Entries are compared by id only. An entry that stays in the folder while
//! its contents change is therefore reported as neither added nor removed;
//! callers that need to see such changes must compare entries themselves.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Entry, Folder};

/// Immutable listing of one folder, newest entry first.
#[derive(Debug, Clone, Serialize)]
pub struct FolderSnapshot {
    pub folder: Folder,
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<Entry>,
}

impl FolderSnapshot {
    pub fn new(folder: Folder, entries: Vec<Entry>) -> Self {
        Self {
            folder,
            taken_at: Utc::now(),
            entries,
        }
    }

    pub fn ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What changed between two snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotDiff {
    /// In `after` but not in `before`, in `after` order.
    pub added: Vec<Entry>,
    /// In `before` but not in `after`, in `before` order.
    pub removed: Vec<Entry>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Id-based set difference of two snapshots.
pub fn diff(before: &FolderSnapshot, after: &FolderSnapshot) -> SnapshotDiff {
    let before_ids: HashSet<i64> = before.entries.iter().map(|e| e.id).collect();
    let after_ids: HashSet<i64> = after.entries.iter().map(|e| e.id).collect();

    SnapshotDiff {
        added: after
            .entries
            .iter()
            .filter(|e| !before_ids.contains(&e.id))
            .cloned()
            .collect(),
        removed: before
            .entries
            .iter()
            .filter(|e| !after_ids.contains(&e.id))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryState;
    use proptest::prelude::*;

    fn entry(id: i64) -> Entry {
        Entry {
            id,
            author: format!("User {id}"),
            target: format!("Test page {id}"),
            base_revision: None,
            proposed_text: "text".into(),
            summary: String::new(),
            state: EntryState::Pending,
            conflict_flag: false,
            created_at: Utc::now(),
            resolved_by: None,
            resolved_at: None,
            resolved_revision: None,
        }
    }

    fn snap(ids: &[i64]) -> FolderSnapshot {
        FolderSnapshot::new(Folder::Pending, ids.iter().copied().map(entry).collect())
    }

    fn ids(entries: &[Entry]) -> Vec<i64> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_diff_of_identical_snapshots_is_empty() {
        let s = snap(&[5, 3, 2]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_added_and_removed_preserve_order() {
        let before = snap(&[5, 4, 2, 1]);
        let after = snap(&[8, 7, 5, 2]);
        let d = diff(&before, &after);
        assert_eq!(ids(&d.added), vec![8, 7]);
        assert_eq!(ids(&d.removed), vec![4, 1]);
    }

    #[test]
    fn test_added_and_removed_are_disjoint() {
        let d = diff(&snap(&[1, 2, 3]), &snap(&[3, 4]));
        let added: HashSet<i64> = ids(&d.added).into_iter().collect();
        assert!(ids(&d.removed).iter().all(|id| !added.contains(id)));
    }

    #[test]
    fn test_changed_entry_with_same_id_is_invisible() {
        let before = snap(&[1]);
        let mut after = snap(&[1]);
        after.entries[0].conflict_flag = true;
        after.entries[0].proposed_text = "rewritten".into();
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn test_empty_snapshots() {
        let empty = snap(&[]);
        let d = diff(&empty, &snap(&[9]));
        assert_eq!(ids(&d.added), vec![9]);
        assert!(d.removed.is_empty());
        assert!(empty.is_empty());
    }

    fn distinct_ids() -> impl proptest::strategy::Strategy<Value = Vec<i64>> {
        proptest::collection::hash_set(0i64..64, 0..24).prop_map(|s| s.into_iter().collect())
    }

    fn is_subsequence(part: &[i64], whole: &[i64]) -> bool {
        let mut rest = whole.iter();
        part.iter().all(|id| rest.any(|w| w == id))
    }

    proptest! {
        #[test]
        fn diff_sides_are_disjoint_and_ordered(before in distinct_ids(), after in distinct_ids()) {
            let d = diff(&snap(&before), &snap(&after));
            let added = ids(&d.added);
            let removed = ids(&d.removed);

            let added_set: HashSet<i64> = added.iter().copied().collect();
            prop_assert!(removed.iter().all(|id| !added_set.contains(id)));
            prop_assert!(is_subsequence(&added, &after));
            prop_assert!(is_subsequence(&removed, &before));
        }

        #[test]
        fn diff_with_itself_is_empty(listed in distinct_ids()) {
            let s = snap(&listed);
            prop_assert!(diff(&s, &s).is_empty());
        }
    }
}
