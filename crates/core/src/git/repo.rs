//! Repository discovery via `git2`.
//!
//! Scans start from an arbitrary workspace directory or document path; this
//! module finds the enclosing work tree and maps documents to
//! repository-relative paths.

use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::{debug, info};

use crate::errors::GitError;

/// A discovered, non-bare repository work tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    workdir: PathBuf,
}

impl RepoLocation {
    /// Find the repository enclosing `start`.
    ///
    /// Fails with [`GitError::RepositoryNotFound`] when there is no version
    /// control metadata at or above `start`, or the repository is bare.
    pub fn discover(start: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(start)
            .map_err(|_| GitError::RepositoryNotFound(start.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::RepositoryNotFound(start.display().to_string()))?;
        let workdir = normalize(workdir);
        info!(workdir = %workdir.display(), "discovered git repository");
        Ok(Self { workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Whether the repository is still present on disk.
    pub fn is_accessible(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    /// Repository-relative, `/`-separated path of `document`, or `None` when
    /// it lies outside the work tree.
    pub fn relative_path(&self, document: &Path) -> Option<String> {
        let absolute = if document.is_absolute() {
            document.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(document)
        };
        let absolute = normalize(&absolute);
        let relative = absolute.strip_prefix(&self.workdir).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        let joined = parts.join("/");
        debug!(document = %document.display(), relative = %joined, "mapped document path");
        Some(joined)
    }
}

/// Canonicalize when possible so symlinked temp dirs compare equal; fall
/// back to canonicalizing the parent for paths that no longer exist.
fn normalize(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
