//! Domain model types used throughout premerge.
//!
//! These types bridge the git plumbing layer, the conflict pipeline, the
//! registry, and the CLI's table/JSON rendering.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Commits and refs
// ---------------------------------------------------------------------------

/// Full hexadecimal commit identifier as printed by git.
///
/// Equality is exact string comparison; no abbreviation matching is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    /// Accept a trimmed `rev-parse` output line. Returns `None` unless the
    /// value is 40 (SHA-1) or 64 (SHA-256) hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid_len = raw.len() == 40 || raw.len() == 64;
        if valid_len && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First seven characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

impl std::fmt::Display for CommitSha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a resolved branch lives locally or under a remote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Local,
    Remote,
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// A branch name resolved to a verified commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// The ref string that verified (e.g. `main`, `origin/main`).
    pub name: String,
    pub kind: RefKind,
    pub commit: CommitSha,
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Outcome of classifying one candidate path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    NoConflict,
    ContentConflict,
    CreateDeleteConflict,
}

impl ConflictKind {
    /// Whether this verdict puts the path into the registry.
    pub fn is_conflict(self) -> bool {
        !matches!(self, Self::NoConflict)
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoConflict => write!(f, "none"),
            Self::ContentConflict => write!(f, "content"),
            Self::CreateDeleteConflict => write!(f, "create_delete"),
        }
    }
}

/// What the merge-tree probe said about a diverged candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Conflict markers were found for the path.
    Confirmed,
    /// The probe ran but emitted no markers for the path.
    NoMarkers,
    /// The probe failed or timed out.
    Unavailable,
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::NoMarkers => write!(f, "no_markers"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// The three file versions a content decision was based on.
///
/// Absent versions are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub base_text: String,
    pub current_text: String,
    pub target_text: String,
}

/// Classification result for one candidate path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictVerdict {
    /// Repository-relative path.
    pub path: String,
    pub kind: ConflictKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
    #[serde(skip)]
    pub evidence: Option<Evidence>,
}

impl ConflictVerdict {
    pub fn new(path: impl Into<String>, kind: ConflictKind) -> Self {
        Self {
            path: path.into(),
            kind,
            probe: None,
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn with_probe(mut self, probe: ProbeOutcome) -> Self {
        self.probe = Some(probe);
        self
    }
}

// ---------------------------------------------------------------------------
// Line localization
// ---------------------------------------------------------------------------

/// Inclusive, 0-based range of document lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Editors number lines from 1.
        if self.start == self.end {
            write!(f, "{}", self.start + 1)
        } else {
            write!(f, "{}-{}", self.start + 1, self.end + 1)
        }
    }
}

/// Where in a live document a content conflict was located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineLocation {
    /// Specific lines matched divergence points.
    Lines { ranges: Vec<LineRange> },
    /// Nothing matched; the whole document is flagged.
    WholeDocument { line_count: usize },
}

// ---------------------------------------------------------------------------
// Scan report
// ---------------------------------------------------------------------------

/// Full result of one completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub repo_root: PathBuf,
    pub current: BranchRef,
    pub target: BranchRef,
    pub merge_base: CommitSha,
    /// Every candidate, sorted by path.
    pub verdicts: Vec<ConflictVerdict>,
    /// Document the scan was triggered for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    /// Line location for the document when it holds a content conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_lines: Option<LineLocation>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ScanReport {
    /// Verdicts that put their path into the registry.
    pub fn conflicts(&self) -> impl Iterator<Item = &ConflictVerdict> {
        self.verdicts.iter().filter(|v| v.kind.is_conflict())
    }

    /// Absolute paths of conflicted files.
    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.conflicts().map(|v| self.repo_root.join(&v.path)).collect()
    }
}
