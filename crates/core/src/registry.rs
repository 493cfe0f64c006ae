//! Process-wide store of conflicted files.
//!
//! Membership is replaced wholesale per repository when a scan completes; a
//! path is a member iff the latest completed scan for the configured target
//! classified it as a conflict. Readers never observe a half-applied scan.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

#[derive(Debug, Default)]
struct RegistryState {
    /// Bumped whenever the target changes or the registry is cleared; scans
    /// started under an older generation are discarded.
    generation: u64,
    target: Option<String>,
    by_repo: HashMap<PathBuf, BTreeSet<PathBuf>>,
}

/// Thread-safe conflict registry, shared as `Arc<ConflictRegistry>`.
#[derive(Debug, Default)]
pub struct ConflictRegistry {
    state: RwLock<RegistryState>,
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: no code path panics between the writes of a
    // single update.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `path` (absolute) is currently flagged.
    pub fn is_conflicted(&self, path: &Path) -> bool {
        self.read().by_repo.values().any(|paths| paths.contains(path))
    }

    /// Every flagged path, sorted.
    pub fn list_conflicted(&self) -> Vec<PathBuf> {
        let state = self.read();
        let all: BTreeSet<&PathBuf> = state.by_repo.values().flatten().collect();
        all.into_iter().cloned().collect()
    }

    /// Flagged paths inside one repository, sorted.
    pub fn list_for_repo(&self, repo_root: &Path) -> Vec<PathBuf> {
        self.read()
            .by_repo
            .get(repo_root)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all membership and invalidate in-flight scans.
    pub fn clear_all(&self) {
        let mut state = self.write();
        state.by_repo.clear();
        state.generation += 1;
        info!(generation = state.generation, "conflict registry cleared");
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn configured_target(&self) -> Option<String> {
        self.read().target.clone()
    }

    /// Set the target membership refers to and return the generation a scan
    /// for it must present. Switching targets clears the registry.
    pub fn configure_target(&self, target: &str) -> u64 {
        let mut state = self.write();
        if state.target.as_deref() != Some(target) {
            if state.target.is_some() {
                info!(
                    from = state.target.as_deref().unwrap_or_default(),
                    to = target,
                    "target changed, clearing conflict registry"
                );
            }
            state.target = Some(target.to_string());
            state.by_repo.clear();
            state.generation += 1;
        }
        state.generation
    }

    /// Replace `repo_root`'s membership with `paths`.
    ///
    /// `generation` is the value read when the scan started. Returns `false`
    /// (and changes nothing) when the registry moved on since then. A scan
    /// for a target other than the configured one switches the registry to
    /// that target, dropping every other repository's membership.
    pub fn apply_scan(
        &self,
        generation: u64,
        target: &str,
        repo_root: &Path,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> bool {
        let mut state = self.write();
        if state.generation != generation {
            debug!(
                scan_generation = generation,
                current_generation = state.generation,
                "stale scan result discarded"
            );
            return false;
        }
        if state.target.as_deref() != Some(target) {
            info!(to = target, "scan switched target, clearing conflict registry");
            state.target = Some(target.to_string());
            state.by_repo.clear();
            state.generation += 1;
        }

        let paths: BTreeSet<PathBuf> = paths.into_iter().collect();
        info!(repo = %repo_root.display(), conflicted = paths.len(), "registry updated");
        if paths.is_empty() {
            state.by_repo.remove(repo_root);
        } else {
            state.by_repo.insert(repo_root.to_path_buf(), paths);
        }
        true
    }
}
