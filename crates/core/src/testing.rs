//! In-memory [`GitPlumbing`] used by unit tests of the pipeline stages.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::GitError;
use crate::git::GitPlumbing;
use crate::models::CommitSha;

/// Deterministic fake SHA built from one byte.
pub fn sha(id: u8) -> CommitSha {
    CommitSha::parse(&format!("{id:02x}").repeat(20)).expect("valid fake sha")
}

pub struct FakeRepo {
    workdir: PathBuf,
    head: String,
    refs: HashMap<String, CommitSha>,
    local: Vec<String>,
    remote: Vec<String>,
    trees: HashMap<CommitSha, BTreeMap<String, String>>,
    merge_bases: HashMap<(CommitSha, CommitSha), CommitSha>,
    merge_tree_output: Option<String>,
    diff_failures: AtomicUsize,
    calls: Mutex<Vec<String>>,
    merge_tree_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakeRepo {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            head: "HEAD".into(),
            refs: HashMap::new(),
            local: Vec::new(),
            remote: Vec::new(),
            trees: HashMap::new(),
            merge_bases: HashMap::new(),
            merge_tree_output: None,
            diff_failures: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            merge_tree_hook: Mutex::new(None),
        }
    }

    pub fn commit(&mut self, id: u8, files: &[(&str, &str)]) -> CommitSha {
        let commit = sha(id);
        let tree = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.to_string()))
            .collect();
        self.trees.insert(commit.clone(), tree);
        commit
    }

    pub fn local_branch(&mut self, name: &str, commit: &CommitSha) {
        self.refs.insert(name.to_string(), commit.clone());
        self.refs.insert(format!("refs/heads/{name}"), commit.clone());
        self.local.push(name.to_string());
    }

    pub fn remote_branch(&mut self, name: &str, commit: &CommitSha) {
        self.refs.insert(name.to_string(), commit.clone());
        self.refs.insert(format!("refs/remotes/{name}"), commit.clone());
        self.remote.push(name.to_string());
    }

    pub fn checkout(&mut self, name: &str) {
        if let Some(commit) = self.refs.get(name).cloned() {
            self.refs.insert("HEAD".into(), commit);
        }
        self.head = name.to_string();
    }

    pub fn detach(&mut self, commit: &CommitSha) {
        self.refs.insert("HEAD".into(), commit.clone());
        self.head = "HEAD".into();
    }

    pub fn set_merge_base(&mut self, a: &CommitSha, b: &CommitSha, base: &CommitSha) {
        self.merge_bases.insert((a.clone(), b.clone()), base.clone());
        self.merge_bases.insert((b.clone(), a.clone()), base.clone());
    }

    pub fn set_merge_tree_output(&mut self, output: Option<&str>) {
        self.merge_tree_output = output.map(str::to_string);
    }

    /// Run `hook` once, the first time the merge-tree probe is invoked.
    pub fn on_merge_tree(&self, hook: impl FnOnce() + Send + 'static) {
        if let Ok(mut slot) = self.merge_tree_hook.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    /// Make the next `n` diff invocations fail.
    pub fn fail_diffs(&self, n: usize) {
        self.diff_failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn lookup(&self, reference: &str) -> Option<CommitSha> {
        if let Some(commit) = self.refs.get(reference) {
            return Some(commit.clone());
        }
        CommitSha::parse(reference).filter(|c| self.trees.contains_key(c))
    }
}

fn command_failed(command: &str, stderr: &str) -> GitError {
    GitError::CommandFailed {
        command: command.into(),
        exit_code: 128,
        stderr: stderr.into(),
    }
}

#[async_trait]
impl GitPlumbing for FakeRepo {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn verify_ref(&self, reference: &str) -> Result<Option<CommitSha>, GitError> {
        self.record(format!("verify {reference}"));
        Ok(self.lookup(reference))
    }

    async fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.head.clone())
    }

    async fn list_branches(&self, remote: bool) -> Result<Vec<String>, GitError> {
        self.record(format!("list remote={remote}"));
        Ok(if remote {
            self.remote.clone()
        } else {
            self.local.clone()
        })
    }

    async fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitSha>, GitError> {
        let (Some(a), Some(b)) = (self.lookup(a), self.lookup(b)) else {
            return Ok(None);
        };
        if a == b {
            return Ok(Some(a));
        }
        Ok(self.merge_bases.get(&(a, b)).cloned())
    }

    async fn diff_name_only(&self, revisions: &[&str]) -> Result<Vec<String>, GitError> {
        self.record(format!("diff {}", revisions.join(" ")));
        let remaining = self.diff_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.diff_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(command_failed("diff", "injected failure"));
        }

        let revs: Vec<&str> = revisions
            .iter()
            .copied()
            .filter(|r| *r != "--end-of-options")
            .collect();
        let (from, to) = match revs.as_slice() {
            [range] => range
                .split_once("..")
                .ok_or_else(|| command_failed("diff", "not a range"))?,
            [from, to] => (*from, *to),
            _ => return Err(command_failed("diff", "bad arguments")),
        };
        let from = self
            .lookup(from)
            .ok_or_else(|| command_failed("diff", "unknown revision"))?;
        let to = self
            .lookup(to)
            .ok_or_else(|| command_failed("diff", "unknown revision"))?;

        let empty = BTreeMap::new();
        let old = self.trees.get(&from).unwrap_or(&empty);
        let new = self.trees.get(&to).unwrap_or(&empty);
        let paths: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        Ok(paths
            .into_iter()
            .filter(|p| old.get(*p) != new.get(*p))
            .cloned()
            .collect())
    }

    async fn blob_exists(&self, commit: &CommitSha, path: &str) -> Result<bool, GitError> {
        Ok(self
            .trees
            .get(commit)
            .map(|t| t.contains_key(path))
            .unwrap_or(false))
    }

    async fn show_blob(&self, commit: &CommitSha, path: &str) -> Result<String, GitError> {
        self.trees
            .get(commit)
            .and_then(|t| t.get(path))
            .cloned()
            .ok_or_else(|| command_failed("show", "path does not exist"))
    }

    async fn merge_tree(
        &self,
        _base: &CommitSha,
        _ours: &CommitSha,
        _theirs: &CommitSha,
    ) -> Result<String, GitError> {
        self.record("merge-tree".into());
        let hook = self.merge_tree_hook.lock().ok().and_then(|mut h| h.take());
        if let Some(hook) = hook {
            hook();
        }
        self.merge_tree_output.clone().ok_or(GitError::Timeout {
            command: "merge-tree".into(),
            secs: 15,
        })
    }
}
