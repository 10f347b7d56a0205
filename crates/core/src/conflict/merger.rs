//! Three-way merge engine.
//!
//! Uses the `diffy` crate to perform line-based three-way merges between the
//! base text an author edited from, the document's current text, and the
//! author's proposed text. The result is only ever shown to a reviewer; it
//! is never applied without an explicit merge action.

use serde::Serialize;
use tracing::debug;

/// The result of a three-way merge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    /// The merged content (contains conflict markers if `has_conflicts` is true).
    pub merged_content: String,
    /// Whether the merge completed without overlapping hunks.
    pub has_conflicts: bool,
    /// Locations of conflict markers within the merged content.
    pub conflict_markers: Vec<ConflictMarker>,
}

/// A single conflict region within merged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConflictMarker {
    /// Line number (1-indexed) of the `<<<<<<<` line.
    pub start_line: usize,
    /// Line number (1-indexed) of the `>>>>>>>` line.
    pub end_line: usize,
}

impl MergeResult {
    fn clean(content: &str) -> Self {
        Self {
            merged_content: content.to_string(),
            has_conflicts: false,
            conflict_markers: Vec::new(),
        }
    }
}

/// Stateless three-way merge engine.
pub struct Merger;

impl Merger {
    /// Merge `current` and `proposed`, both derived from `base`.
    pub fn three_way_merge(base: &str, current: &str, proposed: &str) -> MergeResult {
        if current == base {
            debug!("current == base, proposed wins cleanly");
            return MergeResult::clean(proposed);
        }
        if proposed == base {
            debug!("proposed == base, current wins cleanly");
            return MergeResult::clean(current);
        }
        if current == proposed {
            debug!("current == proposed, identical changes");
            return MergeResult::clean(current);
        }

        match diffy::merge(base, current, proposed) {
            Ok(merged) => {
                debug!("clean three-way merge");
                MergeResult::clean(&merged)
            }
            Err(conflicted) => {
                let markers = find_conflict_markers(&conflicted);
                debug!(regions = markers.len(), "three-way merge has overlapping hunks");
                MergeResult {
                    merged_content: conflicted,
                    has_conflicts: true,
                    conflict_markers: markers,
                }
            }
        }
    }

    /// Unified diff from `old` to `new`, for reviewer display.
    pub fn unified_diff(old: &str, new: &str) -> String {
        diffy::create_patch(old, new).to_string()
    }
}

/// Locate `<<<<<<<` ... `>>>>>>>` blocks in merged output.
fn find_conflict_markers(merged: &str) -> Vec<ConflictMarker> {
    let mut markers = Vec::new();
    let mut open: Option<usize> = None;
    for (idx, line) in merged.lines().enumerate() {
        if line.starts_with("<<<<<<<") {
            open = Some(idx + 1);
        } else if line.starts_with(">>>>>>>") {
            if let Some(start_line) = open.take() {
                markers.push(ConflictMarker {
                    start_line,
                    end_line: idx + 1,
                });
            }
        }
    }
    markers
}
