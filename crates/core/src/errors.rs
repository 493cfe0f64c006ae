//! Error types for the premerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. Git
//! failures surface through [`ScanError::Git`], which keeps the distinction
//! between git refusing a command and git never finishing it.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from git subprocess invocations and repository discovery.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// No repository metadata at or above the given path.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git {command} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// A `git` command did not finish within the configured timeout.
    #[error("git {command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// Every attempt of the diff retry ladder failed.
    #[error("git diff {base}..{target} failed after {attempts} attempts: {last}")]
    DiffFailed {
        base: String,
        target: String,
        attempts: usize,
        last: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GitError {
    /// Whether this error came from the subprocess itself not completing
    /// (timeout, spawn failure) rather than git reporting a failure.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::BinaryNotFound(_) | Self::IoError(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Scan errors
// ---------------------------------------------------------------------------

/// Errors from a conflict scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The target branch did not resolve by any strategy.
    #[error("target branch '{0}' not found locally, on the remote, or by suffix match")]
    RefNotFound(String),

    /// The current branch and the target share no history.
    #[error("no merge base between '{current}' and '{target}'")]
    NoMergeBase { current: String, target: String },

    /// The document being scanned is outside the repository work tree.
    #[error("document '{document}' is not inside repository '{repo}'")]
    OutsideRepository { document: String, repo: String },

    /// Upstream comparison needs a branch; HEAD is detached.
    #[error("HEAD is detached; upstream comparison requires a checked-out branch")]
    DetachedHead,

    /// A git probe failed or timed out.
    #[error("git probe failed: {0}")]
    Git(#[from] GitError),
}

impl ScanError {
    /// Whether the scan could not determine an answer because git never
    /// finished (timeout, missing binary), as opposed to git answering no.
    pub fn is_indeterminate(&self) -> bool {
        match self {
            Self::Git(e) => e.is_indeterminate(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
