//! Conflict anticipation pipeline.
//!
//! The stages, in the order a scan runs them:
//! 1. **Branch resolution** -- turning user-supplied names into verified refs.
//! 2. **Merge base** -- the common ancestor both sides are compared against.
//! 3. **Change sets** -- paths each side touched, and their intersection.
//! 4. **Classification** -- three-way verdict for every candidate path.
//! 5. **Location** -- best-effort line ranges inside a live document.

pub mod branch;
pub mod changeset;
pub mod classifier;
pub mod locator;
pub mod merge_base;

pub use branch::BranchResolver;
pub use changeset::{CandidateSelector, ChangeSet, ChangeSetDiffer};
pub use classifier::{ConflictClassifier, ScanCommits};
pub use locator::LineConflictLocator;
pub use merge_base::MergeBaseResolver;
