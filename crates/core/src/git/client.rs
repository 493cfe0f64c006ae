//! Read-only git plumbing over the `git` CLI.
//!
//! Every invocation runs in the repository work tree, is bounded by a
//! timeout, and never mutates the repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::errors::GitError;
use crate::models::CommitSha;

/// Captured result of one git subprocess that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Asynchronous client running git plumbing commands against one repository.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
    timeout: Duration,
}

impl GitCli {
    /// Create a client rooted at `repo_path` with a per-command `timeout`.
    pub fn new(repo_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_path: repo_path.into(),
            timeout,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// `rev-parse --verify`: the commit `reference` points at, or `None` when
    /// it does not exist.
    #[instrument(skip(self))]
    pub async fn verify_ref(&self, reference: &str) -> Result<Option<CommitSha>, GitError> {
        let revspec = format!("{reference}^{{commit}}");
        let output = self
            .exec(&["rev-parse", "--verify", "--quiet", &revspec])
            .await?;
        if !output.success() {
            debug!(reference, "ref does not verify");
            return Ok(None);
        }
        Ok(CommitSha::parse(&output.stdout))
    }

    /// Like [`verify_ref`](Self::verify_ref), but a missing ref is an error.
    pub async fn rev_parse(&self, reference: &str) -> Result<CommitSha, GitError> {
        self.verify_ref(reference)
            .await?
            .ok_or_else(|| GitError::RefNotFound(reference.to_string()))
    }

    /// Short name of the checked-out branch, or `HEAD` when detached.
    #[instrument(skip(self))]
    pub async fn current_branch(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Short names of local branches (`remote == false`) or remote-tracking
    /// branches (`remote == true`). Symbolic `<remote>/HEAD` entries are
    /// skipped.
    #[instrument(skip(self))]
    pub async fn list_branches(&self, remote: bool) -> Result<Vec<String>, GitError> {
        let mut args = vec!["branch", "--format=%(refname:short)"];
        if remote {
            args.insert(1, "-r");
        }
        let output = self.run(&args).await?;
        let branches: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('('))
            .filter(|l| !remote || (l.contains('/') && !l.ends_with("/HEAD")))
            .map(str::to_string)
            .collect();
        debug!(count = branches.len(), remote, "listed branches");
        Ok(branches)
    }

    /// First merge base of `a` and `b`, or `None` when they share no history
    /// or either does not resolve.
    #[instrument(skip(self))]
    pub async fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitSha>, GitError> {
        let output = self.exec(&["merge-base", a, b]).await?;
        if !output.success() {
            debug!(a, b, exit_code = output.exit_code, "no merge base");
            return Ok(None);
        }
        Ok(output.stdout.lines().next().and_then(CommitSha::parse))
    }

    // -----------------------------------------------------------------------
    // Trees and blobs
    // -----------------------------------------------------------------------

    /// `diff --name-only -z` with caller-supplied revision arguments.
    ///
    /// Paths are NUL-separated and unquoted, so entries are taken verbatim
    /// (no trimming, no C-style unescaping).
    pub async fn diff_name_only(&self, revisions: &[&str]) -> Result<Vec<String>, GitError> {
        let mut args = vec!["diff", "--name-only", "--no-renames", "-z"];
        args.extend_from_slice(revisions);
        let output = self.exec(&args).await?;
        if !output.success() {
            return Err(failure("diff", &output));
        }
        Ok(split_nul(&output.stdout))
    }

    /// Whether `path` is a file (blob) at `commit`. Missing paths and paths
    /// that are directories at `commit` are both absent.
    pub async fn blob_exists(&self, commit: &CommitSha, path: &str) -> Result<bool, GitError> {
        let object = format!("{commit}:{path}");
        let output = self.exec(&["cat-file", "-t", &object]).await?;
        if !output.success() {
            return Ok(false);
        }
        let kind = output.stdout.trim();
        if kind != "blob" {
            debug!(%object, kind, "not a blob");
        }
        Ok(kind == "blob")
    }

    /// Full text of `path` at `commit`.
    ///
    /// Unlike other commands, only the final newline is stripped so that
    /// leading blank lines keep their line numbers.
    pub async fn show_blob(&self, commit: &CommitSha, path: &str) -> Result<String, GitError> {
        let object = format!("{commit}:{path}");
        let output = self.exec(&["show", &object]).await?;
        if !output.success() {
            return Err(failure("show", &output));
        }
        let text = output.stdout;
        let text = text
            .strip_suffix("\r\n")
            .or_else(|| text.strip_suffix('\n'))
            .unwrap_or(&text);
        Ok(text.to_string())
    }

    /// Trivial three-way `merge-tree` over `base`, `ours`, `theirs`.
    #[instrument(skip(self))]
    pub async fn merge_tree(
        &self,
        base: &CommitSha,
        ours: &CommitSha,
        theirs: &CommitSha,
    ) -> Result<String, GitError> {
        self.run(&["merge-tree", base.as_str(), ours.as_str(), theirs.as_str()])
            .await
    }

    // -----------------------------------------------------------------------
    // Process plumbing
    // -----------------------------------------------------------------------

    /// Run a command and return its trimmed stdout; non-zero exit is an error.
    pub async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.exec(args).await?;
        if !output.success() {
            return Err(failure(args.first().copied().unwrap_or("git"), &output));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Run a command to completion and capture its output regardless of the
    /// exit status. Only spawn failures and timeouts are errors.
    pub async fn exec(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        let subcommand = args.first().copied().unwrap_or("git").to_string();
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        let child = cmd.output();
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::BinaryNotFound("git".into())
                } else {
                    GitError::IoError(e)
                }
            })?,
            Err(_) => {
                warn!(command = %subcommand, secs = self.timeout.as_secs(), "git command timed out");
                return Err(GitError::Timeout {
                    command: subcommand,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn split_nul(stdout: &str) -> Vec<String> {
    stdout
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn failure(command: &str, output: &CommandOutput) -> GitError {
    let stderr = output.stderr.trim().to_string();
    debug!(command, exit_code = output.exit_code, %stderr, "git command failed");
    GitError::CommandFailed {
        command: command.to_string(),
        exit_code: output.exit_code,
        stderr,
    }
}
