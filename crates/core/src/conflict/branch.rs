//! Branch resolution.
//!
//! Maps a user-supplied branch name to a ref git can verify, trying in turn
//! the name itself, `<remote>/<name>`, and finally any local or remote branch
//! whose short name matches or whose remote-qualified name ends in `/<name>`.

use tracing::{debug, info, instrument};

use crate::errors::ScanError;
use crate::git::GitPlumbing;
use crate::models::{BranchRef, RefKind};

/// Resolves branch names against one remote.
#[derive(Debug, Clone)]
pub struct BranchResolver {
    remote: String,
}

impl BranchResolver {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Resolve `name` to a verified [`BranchRef`].
    #[instrument(skip(self, git), fields(remote = %self.remote))]
    pub async fn resolve(&self, git: &dyn GitPlumbing, name: &str) -> Result<BranchRef, ScanError> {
        let name = name.trim();
        if name.is_empty() || name.starts_with('-') {
            return Err(ScanError::RefNotFound(name.to_string()));
        }

        // 1. The name as given.
        if let Some(found) = self.verify(git, name).await? {
            debug!(name, "resolved directly");
            return Ok(found);
        }

        // 2. On the configured remote.
        let remote_name = format!("{}/{}", self.remote, name);
        if let Some(found) = self.verify(git, &remote_name).await? {
            debug!(name, resolved = %found.name, "resolved on remote");
            return Ok(found);
        }

        // 3. Any branch whose short name matches or ends with `/<name>`.
        for candidate in self.suffix_candidates(git, name).await? {
            if let Some(found) = self.verify(git, &candidate).await? {
                info!(name, resolved = %found.name, "resolved by branch listing");
                return Ok(found);
            }
        }

        Err(ScanError::RefNotFound(name.to_string()))
    }

    /// The checked-out branch. A detached HEAD resolves to `HEAD` itself.
    pub async fn current(&self, git: &dyn GitPlumbing) -> Result<BranchRef, ScanError> {
        let name = git.current_branch().await?;
        if name == "HEAD" {
            let commit = git
                .verify_ref("HEAD")
                .await?
                .ok_or_else(|| ScanError::RefNotFound("HEAD".into()))?;
            return Ok(BranchRef {
                name,
                kind: RefKind::Local,
                commit,
            });
        }
        match self.verify(git, &name).await? {
            Some(found) => Ok(found),
            None => Err(ScanError::RefNotFound(name)),
        }
    }

    /// The current branch's counterpart on the configured remote.
    pub async fn upstream(
        &self,
        git: &dyn GitPlumbing,
        current: &BranchRef,
    ) -> Result<BranchRef, ScanError> {
        if current.name == "HEAD" {
            return Err(ScanError::DetachedHead);
        }
        let name = format!("{}/{}", self.remote, current.name);
        match self.verify(git, &name).await? {
            Some(found) => Ok(found),
            None => Err(ScanError::RefNotFound(name)),
        }
    }

    async fn verify(
        &self,
        git: &dyn GitPlumbing,
        name: &str,
    ) -> Result<Option<BranchRef>, ScanError> {
        let Some(commit) = git.verify_ref(name).await? else {
            return Ok(None);
        };
        let kind = self.kind_of(git, name).await?;
        Ok(Some(BranchRef {
            name: name.to_string(),
            kind,
            commit,
        }))
    }

    async fn kind_of(&self, git: &dyn GitPlumbing, name: &str) -> Result<RefKind, ScanError> {
        if name.starts_with("refs/remotes/") {
            return Ok(RefKind::Remote);
        }
        if name.starts_with("refs/") || name == "HEAD" {
            return Ok(RefKind::Local);
        }
        if git.verify_ref(&format!("refs/heads/{name}")).await?.is_some() {
            return Ok(RefKind::Local);
        }
        if git.verify_ref(&format!("refs/remotes/{name}")).await?.is_some() {
            return Ok(RefKind::Remote);
        }
        // Tags and raw SHAs.
        Ok(RefKind::Local)
    }

    /// Branch names worth verifying for step 3, most specific first: exact
    /// local matches, then the configured remote, then other remotes.
    async fn suffix_candidates(
        &self,
        git: &dyn GitPlumbing,
        name: &str,
    ) -> Result<Vec<String>, ScanError> {
        let suffix = format!("/{name}");
        let mut candidates: Vec<String> = git
            .list_branches(false)
            .await?
            .into_iter()
            .filter(|b| b == name || b.ends_with(&suffix))
            .collect();

        let mut remote: Vec<String> = git
            .list_branches(true)
            .await?
            .into_iter()
            .filter(|b| b == name || b.ends_with(&suffix))
            .collect();
        let preferred = format!("{}/", self.remote);
        remote.sort_by_key(|b| (!b.starts_with(&preferred), b.len(), b.clone()));
        candidates.extend(remote);
        candidates.dedup();

        debug!(name, count = candidates.len(), "suffix candidates");
        Ok(candidates)
    }
}
