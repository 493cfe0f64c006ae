//! Three-way conflict classification of candidate paths.
//!
//! Cheap checks run first (blob existence, then whole-content comparison);
//! the merge-tree probe only runs for paths where both sides diverged from
//! the base and from each other. The probe runs at most once per scan since
//! its output covers every path.

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::errors::GitError;
use crate::git::merge_tree::path_has_conflict_markers;
use crate::git::GitPlumbing;
use crate::models::{CommitSha, ConflictKind, ConflictVerdict, Evidence, ProbeOutcome};

/// The three commits a scan compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommits {
    pub base: CommitSha,
    pub current: CommitSha,
    pub target: CommitSha,
}

/// Classifies candidates for one (base, current, target) triple.
pub struct ConflictClassifier<'a> {
    git: &'a dyn GitPlumbing,
    commits: ScanCommits,
    probe: OnceCell<Option<String>>,
}

impl<'a> ConflictClassifier<'a> {
    pub fn new(git: &'a dyn GitPlumbing, commits: ScanCommits) -> Self {
        Self {
            git,
            commits,
            probe: OnceCell::new(),
        }
    }

    /// Classify one candidate path.
    ///
    /// Existence and content probes that fail are returned as errors; only
    /// the merge-tree probe degrades (to a fail-safe content conflict).
    pub async fn classify(&self, path: &str) -> Result<ConflictVerdict, GitError> {
        let ScanCommits {
            base,
            current,
            target,
        } = &self.commits;

        let in_base = self.git.blob_exists(base, path).await?;
        let in_current = self.git.blob_exists(current, path).await?;
        let in_target = self.git.blob_exists(target, path).await?;

        if !in_base && in_current != in_target {
            debug!(path, in_current, in_target, "created on one side only");
            return Ok(ConflictVerdict::new(path, ConflictKind::CreateDeleteConflict));
        }
        if !in_current && !in_target {
            debug!(path, "absent on both sides, stale candidate");
            return Ok(ConflictVerdict::new(path, ConflictKind::NoConflict));
        }

        let evidence = Evidence {
            base_text: self.read(base, path, in_base).await?,
            current_text: self.read(current, path, in_current).await?,
            target_text: self.read(target, path, in_target).await?,
        };

        if let Some(kind) = decide_by_content(&evidence) {
            debug!(path, "one-sided or convergent edit");
            return Ok(ConflictVerdict::new(path, kind).with_evidence(evidence));
        }

        let probe = self.probe_markers(path).await;
        match probe {
            ProbeOutcome::Confirmed => debug!(path, "merge-tree confirmed conflict"),
            _ => warn!(path, %probe, "merge-tree did not confirm, assuming conflict"),
        }
        Ok(ConflictVerdict::new(path, ConflictKind::ContentConflict)
            .with_probe(probe)
            .with_evidence(evidence))
    }

    async fn read(&self, commit: &CommitSha, path: &str, exists: bool) -> Result<String, GitError> {
        if !exists {
            return Ok(String::new());
        }
        self.git.show_blob(commit, path).await
    }

    async fn probe_markers(&self, path: &str) -> ProbeOutcome {
        let output = self
            .probe
            .get_or_init(|| async {
                let ScanCommits {
                    base,
                    current,
                    target,
                } = &self.commits;
                match self.git.merge_tree(base, current, target).await {
                    Ok(output) => Some(output),
                    Err(e) => {
                        warn!(error = %e, "merge-tree probe failed");
                        None
                    }
                }
            })
            .await;

        match output {
            None => ProbeOutcome::Unavailable,
            Some(out) if path_has_conflict_markers(out, path) => ProbeOutcome::Confirmed,
            Some(_) => ProbeOutcome::NoMarkers,
        }
    }
}

/// Content-only decision: `Some(NoConflict)` when the edit is convergent or
/// only one side moved away from the base; `None` when both sides diverged
/// and the merge-tree probe must decide.
pub fn decide_by_content(evidence: &Evidence) -> Option<ConflictKind> {
    let Evidence {
        base_text: base,
        current_text: current,
        target_text: target,
    } = evidence;

    if current == target {
        return Some(ConflictKind::NoConflict);
    }
    if base == current && base != target {
        return Some(ConflictKind::NoConflict);
    }
    if base == target && base != current {
        return Some(ConflictKind::NoConflict);
    }
    None
}
