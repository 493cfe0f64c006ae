//! Changed-path sets and their intersection.
//!
//! A [`ChangeSet`] lists the repository-relative paths that differ between a
//! merge base and one branch tip. Paths both sides touched are the conflict
//! candidates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::GitError;
use crate::git::GitPlumbing;

/// Set of repository-relative paths, ordered for deterministic output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeSet<String>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for ChangeSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

/// Stateless two-tree differ with a retry ladder.
pub struct ChangeSetDiffer;

impl ChangeSetDiffer {
    /// Paths that differ between `base` and `reference`.
    ///
    /// Tries, in order: the `<base>..<ref>` range; the two refs as separate
    /// arguments after `--end-of-options`; both refs resolved to full SHAs.
    /// Fails only when every attempt fails. Paths that are directories in
    /// the current work tree are dropped.
    pub async fn diff(
        git: &dyn GitPlumbing,
        base: &str,
        reference: &str,
    ) -> Result<ChangeSet, GitError> {
        let paths = Self::diff_with_retries(git, base, reference).await?;
        let total = paths.len();

        let mut kept = BTreeSet::new();
        for path in paths {
            let on_disk = git.workdir().join(&path);
            let is_dir = tokio::fs::metadata(&on_disk)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                debug!(path = %path, "dropping path that is a directory on disk");
                continue;
            }
            kept.insert(path);
        }

        info!(base, reference, total, kept = kept.len(), "computed change set");
        Ok(ChangeSet(kept))
    }

    async fn diff_with_retries(
        git: &dyn GitPlumbing,
        base: &str,
        reference: &str,
    ) -> Result<Vec<String>, GitError> {
        let range = format!("{base}..{reference}");
        let first = match git.diff_name_only(&[range.as_str()]).await {
            Ok(paths) => return Ok(paths),
            Err(e) => e,
        };
        warn!(base, reference, error = %first, "range diff failed, retrying with separate arguments");

        let second = match git
            .diff_name_only(&["--end-of-options", base, reference])
            .await
        {
            Ok(paths) => return Ok(paths),
            Err(e) => e,
        };
        warn!(base, reference, error = %second, "diff failed, retrying with resolved SHAs");

        let last = match Self::resolve_pair(git, base, reference).await {
            Ok((base_sha, ref_sha)) => {
                let range = format!("{base_sha}..{ref_sha}");
                match git.diff_name_only(&[range.as_str()]).await {
                    Ok(paths) => return Ok(paths),
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        Err(GitError::DiffFailed {
            base: base.to_string(),
            target: reference.to_string(),
            attempts: 3,
            last: last.to_string(),
        })
    }

    async fn resolve_pair(
        git: &dyn GitPlumbing,
        base: &str,
        reference: &str,
    ) -> Result<(String, String), GitError> {
        let base_sha = git
            .verify_ref(base)
            .await?
            .ok_or_else(|| GitError::RefNotFound(base.to_string()))?;
        let ref_sha = git
            .verify_ref(reference)
            .await?
            .ok_or_else(|| GitError::RefNotFound(reference.to_string()))?;
        Ok((base_sha.to_string(), ref_sha.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Stateless candidate selector.
pub struct CandidateSelector;

impl CandidateSelector {
    /// Paths present in both sets; exact, case-sensitive comparison.
    pub fn candidates(a: &ChangeSet, b: &ChangeSet) -> ChangeSet {
        let both: BTreeSet<String> = a.0.intersection(&b.0).cloned().collect();
        debug!(left = a.len(), right = b.len(), candidates = both.len(), "selected candidates");
        ChangeSet(both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepo;

    fn repo(workdir: &std::path::Path) -> FakeRepo {
        let mut repo = FakeRepo::new(workdir);
        let base = repo.commit(1, &[("a.txt", "1"), ("b.txt", "1"), ("dir", "x")]);
        let tip = repo.commit(2, &[("a.txt", "2"), ("c.txt", "new"), ("dir", "y")]);
        repo.local_branch("base", &base);
        repo.local_branch("tip", &tip);
        repo
    }

    #[tokio::test]
    async fn test_diff_lists_changed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let set = ChangeSetDiffer::diff(&repo, "base", "tip").await.unwrap();
        let paths: Vec<&str> = set.iter().collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "c.txt", "dir"]);
        assert_eq!(repo.calls(), vec!["diff base..tip"]);
    }

    #[tokio::test]
    async fn test_directories_on_disk_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("dir")).unwrap();
        let repo = repo(dir.path());
        let set = ChangeSetDiffer::diff(&repo, "base", "tip").await.unwrap();
        assert!(!set.contains("dir"));
        assert!(set.contains("a.txt"));
    }

    #[tokio::test]
    async fn test_retry_ladder_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        repo.fail_diffs(1);
        let set = ChangeSetDiffer::diff(&repo, "base", "tip").await.unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(
            repo.calls(),
            vec!["diff base..tip", "diff --end-of-options base tip"]
        );
    }

    #[tokio::test]
    async fn test_retry_ladder_resolves_shas_last() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        repo.fail_diffs(2);
        let set = ChangeSetDiffer::diff(&repo, "base", "tip").await.unwrap();
        assert_eq!(set.len(), 4);
        let calls = repo.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[2], "verify base");
        assert_eq!(calls[3], "verify tip");
        assert!(calls[4].starts_with("diff 0101"));
    }

    #[tokio::test]
    async fn test_all_attempts_failing_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        repo.fail_diffs(3);
        let err = ChangeSetDiffer::diff(&repo, "base", "tip").await.unwrap_err();
        assert!(matches!(err, GitError::DiffFailed { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_identical_trees_yield_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(dir.path());
        let set = ChangeSetDiffer::diff(&repo, "tip", "tip").await.unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_candidates_are_exact_intersection() {
        let a: ChangeSet = ["src/a.rs", "README.md", "x"].into_iter().collect();
        let b: ChangeSet = ["src/a.rs", "readme.md", "y"].into_iter().collect();
        let both = CandidateSelector::candidates(&a, &b);
        assert_eq!(both.iter().collect::<Vec<_>>(), vec!["src/a.rs"]);
    }
}
