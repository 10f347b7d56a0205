//! Conflict detection and three-way merging.
//!
//! 1. **Detection** -- [`ConflictResolver`] compares an entry's base revision
//!    with the document's current revision at approval time.
//! 2. **Merging** -- [`Merger`] computes a line-based three-way merge for the
//!    reviewer when the document has moved.

pub mod merger;
pub mod resolver;

pub use merger::{ConflictMarker, MergeResult, Merger};
pub use resolver::{CheckOutcome, ConflictReport, ConflictResolver};
