//! The read-only git surface the conflict pipeline depends on.
//!
//! [`GitCli`] is the production implementation. The pipeline stages take a
//! `&dyn GitPlumbing` so they can be exercised against an in-memory
//! repository in unit tests.

use std::path::Path;

use async_trait::async_trait;

use super::client::GitCli;
use crate::errors::GitError;
use crate::models::CommitSha;

#[async_trait]
pub trait GitPlumbing: Send + Sync {
    /// Work tree root; used to filter paths that are directories on disk.
    fn workdir(&self) -> &Path;

    async fn verify_ref(&self, reference: &str) -> Result<Option<CommitSha>, GitError>;

    async fn current_branch(&self) -> Result<String, GitError>;

    async fn list_branches(&self, remote: bool) -> Result<Vec<String>, GitError>;

    async fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitSha>, GitError>;

    async fn diff_name_only(&self, revisions: &[&str]) -> Result<Vec<String>, GitError>;

    async fn blob_exists(&self, commit: &CommitSha, path: &str) -> Result<bool, GitError>;

    async fn show_blob(&self, commit: &CommitSha, path: &str) -> Result<String, GitError>;

    async fn merge_tree(
        &self,
        base: &CommitSha,
        ours: &CommitSha,
        theirs: &CommitSha,
    ) -> Result<String, GitError>;
}

#[async_trait]
impl GitPlumbing for GitCli {
    fn workdir(&self) -> &Path {
        self.repo_path()
    }

    async fn verify_ref(&self, reference: &str) -> Result<Option<CommitSha>, GitError> {
        GitCli::verify_ref(self, reference).await
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        GitCli::current_branch(self).await
    }

    async fn list_branches(&self, remote: bool) -> Result<Vec<String>, GitError> {
        GitCli::list_branches(self, remote).await
    }

    async fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitSha>, GitError> {
        GitCli::merge_base(self, a, b).await
    }

    async fn diff_name_only(&self, revisions: &[&str]) -> Result<Vec<String>, GitError> {
        GitCli::diff_name_only(self, revisions).await
    }

    async fn blob_exists(&self, commit: &CommitSha, path: &str) -> Result<bool, GitError> {
        GitCli::blob_exists(self, commit, path).await
    }

    async fn show_blob(&self, commit: &CommitSha, path: &str) -> Result<String, GitError> {
        GitCli::show_blob(self, commit, path).await
    }

    async fn merge_tree(
        &self,
        base: &CommitSha,
        ours: &CommitSha,
        theirs: &CommitSha,
    ) -> Result<String, GitError> {
        GitCli::merge_tree(self, base, ours, theirs).await
    }
}
