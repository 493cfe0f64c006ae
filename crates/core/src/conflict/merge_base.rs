//! Common-ancestor lookup.

use tracing::debug;

use crate::errors::ScanError;
use crate::git::GitPlumbing;
use crate::models::{BranchRef, CommitSha};

/// Stateless merge-base resolver.
pub struct MergeBaseResolver;

impl MergeBaseResolver {
    /// The merge base of `current` and `target`.
    ///
    /// When git reports several merge bases the first one is used as-is.
    pub async fn common_ancestor(
        git: &dyn GitPlumbing,
        current: &BranchRef,
        target: &BranchRef,
    ) -> Result<CommitSha, ScanError> {
        if current.commit == target.commit {
            return Ok(current.commit.clone());
        }
        match git
            .merge_base(current.commit.as_str(), target.commit.as_str())
            .await?
        {
            Some(base) => {
                debug!(base = %base.short(), "found merge base");
                Ok(base)
            }
            None => Err(ScanError::NoMergeBase {
                current: current.name.clone(),
                target: target.name.clone(),
            }),
        }
    }
}
