//! Scan orchestration.
//!
//! The [`ScanEngine`] runs the conflict pipeline for one request:
//!
//! 1. Discover the repository enclosing the workspace root.
//! 2. Resolve the current branch and the comparison target.
//! 3. Find the merge base and both change sets.
//! 4. Classify every candidate path.
//! 5. Locate conflict lines in the triggering document.
//! 6. Commit the conflicted paths to the [`ConflictRegistry`], unless the
//!    registry moved on or the repository disappeared mid-scan.
//!
//! Any git failure aborts the scan before step 6, leaving the registry as it
//! was.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{AppConfig, CompareMode};
use crate::conflict::{
    BranchResolver, CandidateSelector, ChangeSetDiffer, ConflictClassifier, LineConflictLocator,
    MergeBaseResolver, ScanCommits,
};
use crate::errors::{GitError, ScanError};
use crate::git::{GitCli, GitPlumbing, RepoLocation};
use crate::models::{
    BranchRef, CommitSha, ConflictKind, ConflictVerdict, LineLocation, ScanReport,
};
use crate::registry::ConflictRegistry;

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// What the current branch is compared against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTarget {
    /// A named branch, resolved through [`BranchResolver::resolve`].
    Branch(String),
    /// The current branch on the configured remote.
    Upstream,
}

impl ScanTarget {
    /// The target selected by configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        match config.scan.compare {
            CompareMode::Target => Self::Branch(config.scan.target_branch.clone()),
            CompareMode::Upstream => Self::Upstream,
        }
    }

    /// Key under which registry membership is recorded.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Branch(name) => write!(f, "{name}"),
            Self::Upstream => write!(f, "@upstream"),
        }
    }
}

/// One scan trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Directory the repository is discovered from.
    pub workspace_root: PathBuf,
    /// Document whose conflict lines should be located, if any.
    pub document: Option<PathBuf>,
    pub target: ScanTarget,
}

/// A scanned document, absolute and repository-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedDocument {
    pub path: PathBuf,
    pub relative: String,
}

/// Why a finished scan was not committed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The target was reconfigured or the registry cleared mid-scan.
    Superseded,
    /// The repository was removed or became inaccessible mid-scan.
    RepositoryGone,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Superseded => write!(f, "superseded"),
            Self::RepositoryGone => write!(f, "repository_gone"),
        }
    }
}

/// Result of [`ScanEngine::scan`].
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// No repository encloses the workspace; nothing to do.
    NoRepository,
    Discarded(DiscardReason),
}

impl ScanOutcome {
    /// Verdicts of a completed scan; empty otherwise.
    pub fn verdicts(&self) -> &[ConflictVerdict] {
        match self {
            Self::Completed(report) => &report.verdicts,
            _ => &[],
        }
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ScanEngine {
    config: AppConfig,
    registry: Arc<ConflictRegistry>,
}

impl ScanEngine {
    pub fn new(config: AppConfig, registry: Arc<ConflictRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConflictRegistry> {
        &self.registry
    }

    /// Run one scan and commit its result to the registry.
    #[instrument(skip(self, request), fields(root = %request.workspace_root.display(), scan_target = %request.target))]
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, ScanError> {
        let generation = self.registry.generation();

        let location = match RepoLocation::discover(&request.workspace_root) {
            Ok(location) => location,
            Err(GitError::RepositoryNotFound(path)) => {
                debug!(path = %path, "no repository, skipping scan");
                return Ok(ScanOutcome::NoRepository);
            }
            Err(e) => return Err(e.into()),
        };

        let git = GitCli::new(location.workdir(), self.config.scan.command_timeout());
        self.scan_in(generation, &location, &git, request).await
    }

    /// Analyze inside a discovered repository and commit the result, unless
    /// the registry moved past `generation` or the repository disappeared
    /// while the scan ran.
    async fn scan_in(
        &self,
        generation: u64,
        location: &RepoLocation,
        git: &dyn GitPlumbing,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ScanError> {
        let document = match &request.document {
            Some(path) => Some(Self::track(location, path)?),
            None => None,
        };

        let report = self
            .analyze(git, &request.target, document.as_ref())
            .await?;

        if !location.is_accessible() {
            warn!(repo = %location.workdir().display(), "repository gone, discarding scan");
            return Ok(ScanOutcome::Discarded(DiscardReason::RepositoryGone));
        }
        let committed = self.registry.apply_scan(
            generation,
            &request.target.label(),
            location.workdir(),
            report.conflicted_paths(),
        );
        if !committed {
            info!(scan_id = %report.scan_id, "registry changed mid-scan, discarding result");
            return Ok(ScanOutcome::Discarded(DiscardReason::Superseded));
        }

        Ok(ScanOutcome::Completed(report))
    }

    /// Resolve `name` the same way a scan resolves its target.
    pub async fn resolve_branch(
        &self,
        workspace_root: &Path,
        name: &str,
    ) -> Result<BranchRef, ScanError> {
        let location = RepoLocation::discover(workspace_root)?;
        let git = GitCli::new(location.workdir(), self.config.scan.command_timeout());
        BranchResolver::new(&self.config.scan.remote)
            .resolve(&git, name)
            .await
    }

    fn track(location: &RepoLocation, document: &Path) -> Result<TrackedDocument, ScanError> {
        let relative =
            location
                .relative_path(document)
                .ok_or_else(|| ScanError::OutsideRepository {
                    document: document.display().to_string(),
                    repo: location.workdir().display().to_string(),
                })?;
        Ok(TrackedDocument {
            path: location.workdir().join(&relative),
            relative,
        })
    }

    /// The pipeline itself, without registry bookkeeping.
    pub async fn analyze(
        &self,
        git: &dyn GitPlumbing,
        target: &ScanTarget,
        document: Option<&TrackedDocument>,
    ) -> Result<ScanReport, ScanError> {
        let started_at = Utc::now();
        let scan_id = Uuid::new_v4().to_string();
        let resolver = BranchResolver::new(&self.config.scan.remote);

        let current = resolver.current(git).await?;
        let target = match target {
            ScanTarget::Branch(name) => resolver.resolve(git, name).await?,
            ScanTarget::Upstream => resolver.upstream(git, &current).await?,
        };
        info!(
            scan_id = %scan_id,
            current = %current.name,
            target_ref = %target.name,
            "scanning for conflicts"
        );

        let report = |merge_base: CommitSha,
                      verdicts: Vec<ConflictVerdict>,
                      document_lines: Option<LineLocation>| ScanReport {
            scan_id: scan_id.clone(),
            repo_root: git.workdir().to_path_buf(),
            current: current.clone(),
            target: target.clone(),
            merge_base,
            verdicts,
            document: document.map(|d| d.path.clone()),
            document_lines,
            started_at,
            completed_at: Utc::now(),
        };

        if current.commit == target.commit {
            debug!("current and target are the same commit");
            return Ok(report(current.commit.clone(), Vec::new(), None));
        }

        let base = MergeBaseResolver::common_ancestor(git, &current, &target).await?;
        // Diff the commits captured at resolution so candidates and verdicts
        // come from one snapshot even if a branch tip moves mid-scan.
        let ours = ChangeSetDiffer::diff(git, base.as_str(), current.commit.as_str()).await?;
        let theirs = ChangeSetDiffer::diff(git, base.as_str(), target.commit.as_str()).await?;
        let candidates = CandidateSelector::candidates(&ours, &theirs);

        let classifier = ConflictClassifier::new(
            git,
            ScanCommits {
                base: base.clone(),
                current: current.commit.clone(),
                target: target.commit.clone(),
            },
        );
        let mut verdicts = Vec::with_capacity(candidates.len());
        for path in candidates.iter() {
            verdicts.push(classifier.classify(path).await?);
        }

        let document_lines = match document {
            Some(doc) => self.locate(doc, &verdicts).await,
            None => None,
        };

        let conflicted = verdicts.iter().filter(|v| v.kind.is_conflict()).count();
        info!(
            scan_id = %scan_id,
            candidates = verdicts.len(),
            conflicted,
            "scan complete"
        );
        Ok(report(base, verdicts, document_lines))
    }

    /// Line location for `document` when it holds a content conflict. The
    /// live file is preferred; the current branch's text stands in when it
    /// cannot be read.
    async fn locate(
        &self,
        document: &TrackedDocument,
        verdicts: &[ConflictVerdict],
    ) -> Option<LineLocation> {
        let verdict = verdicts
            .iter()
            .find(|v| v.path == document.relative && v.kind == ConflictKind::ContentConflict)?;
        let evidence = verdict.evidence.as_ref()?;

        let text = match tokio::fs::read_to_string(&document.path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %document.path.display(), error = %e, "document unreadable, using branch text");
                evidence.current_text.clone()
            }
        };
        let locator = LineConflictLocator::new(self.config.locator.search_window);
        Some(locator.locate(evidence, &text))
    }
}
