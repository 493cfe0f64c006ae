//! End-to-end tests for conflict scans against real git repositories.
//!
//! These tests exercise the real `ScanEngine` with:
//! - Repositories created in temp directories with the `git` binary
//! - A `main` target branch and a checked-out `feature` branch
//! - The shared `ConflictRegistry`
//!
//! No network I/O: remote branches are plain `refs/remotes/*` refs.
//!
//! Tests skip gracefully if `git` is not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use premerge_core::config::AppConfig;
use premerge_core::conflict::{ConflictClassifier, ScanCommits};
use premerge_core::errors::ScanError;
use premerge_core::git::GitCli;
use premerge_core::models::{ConflictKind, LineLocation, RefKind};
use premerge_core::scan_engine::{ScanEngine, ScanOutcome, ScanRequest, ScanTarget};
use premerge_core::ConflictRegistry;

// ===========================================================================
// Helpers
// ===========================================================================

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn write_files(dir: &Path, files: &[(&str, Option<&str>)]) {
    for (path, content) in files {
        let full = dir.join(path);
        match content {
            Some(content) => {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(&full, content).unwrap();
            }
            None => {
                let _ = std::fs::remove_file(&full);
            }
        }
    }
}

fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", message]);
}

/// A repository where `feature` (checked out) and `main` both branched from
/// one base commit. `None` deletes a file.
fn setup_repo(
    tmp: &TempDir,
    base: &[(&str, Option<&str>)],
    feature: &[(&str, Option<&str>)],
    main: &[(&str, Option<&str>)],
) -> PathBuf {
    let dir = tmp.path().join("work");
    std::fs::create_dir_all(&dir).unwrap();
    git(&dir, &["init", "-q"]);
    git(&dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&dir, &["config", "user.name", "Test User"]);
    git(&dir, &["config", "user.email", "test@example.com"]);
    git(&dir, &["config", "commit.gpgsign", "false"]);

    write_files(&dir, base);
    commit_all(&dir, "base");

    git(&dir, &["checkout", "-q", "-b", "feature"]);
    write_files(&dir, feature);
    commit_all(&dir, "feature work");

    git(&dir, &["checkout", "-q", "main"]);
    write_files(&dir, main);
    commit_all(&dir, "main work");

    git(&dir, &["checkout", "-q", "feature"]);
    dir
}

fn make_engine() -> ScanEngine {
    ScanEngine::new(AppConfig::default(), Arc::new(ConflictRegistry::new()))
}

fn scan_request(dir: &Path, target: &str) -> ScanRequest {
    ScanRequest {
        workspace_root: dir.to_path_buf(),
        document: None,
        target: ScanTarget::Branch(target.to_string()),
    }
}

fn verdict_kinds(outcome: &ScanOutcome) -> Vec<(String, ConflictKind)> {
    outcome
        .verdicts()
        .iter()
        .map(|v| (v.path.clone(), v.kind))
        .collect()
}

// ===========================================================================
// Scenarios
// ===========================================================================

/// Only the current branch changed the file: never a conflict.
#[tokio::test]
async fn test_one_sided_edit_is_not_a_conflict() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n")), ("other.txt", Some("a\n"))],
        &[("f.txt", Some("2\n"))],
        &[("other.txt", Some("b\n"))],
    );

    let engine = make_engine();
    let outcome = engine.scan(&scan_request(&dir, "main")).await.unwrap();
    assert!(matches!(outcome, ScanOutcome::Completed(_)));
    assert!(outcome.verdicts().iter().all(|v| !v.kind.is_conflict()));
    assert!(engine.registry().list_conflicted().is_empty());
}

/// Both sides changed the same line differently.
#[tokio::test]
async fn test_diverged_edit_is_a_content_conflict() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("f.txt", Some("2\n"))],
        &[("f.txt", Some("3\n"))],
    );

    let engine = make_engine();
    let outcome = engine.scan(&scan_request(&dir, "main")).await.unwrap();
    assert_eq!(
        verdict_kinds(&outcome),
        vec![("f.txt".to_string(), ConflictKind::ContentConflict)]
    );

    let expected = dir.canonicalize().unwrap().join("f.txt");
    assert!(engine.registry().is_conflicted(&expected));
    assert_eq!(engine.registry().list_conflicted(), vec![expected]);
}

/// Both sides made the same change.
#[tokio::test]
async fn test_convergent_edit_is_not_a_conflict() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("f.txt", Some("2\n"))],
        &[("f.txt", Some("2\n")), ("extra.txt", Some("x\n"))],
    );

    let outcome = make_engine()
        .scan(&scan_request(&dir, "main"))
        .await
        .unwrap();
    assert_eq!(
        verdict_kinds(&outcome),
        vec![("f.txt".to_string(), ConflictKind::NoConflict)]
    );
}

/// A path absent at the base and present on one side only.
#[tokio::test]
async fn test_created_on_one_side_is_create_delete() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("new.txt", Some("fresh\n"))],
        &[("f.txt", Some("3\n"))],
    );

    let git = GitCli::new(&dir, Duration::from_secs(15));
    let current = git.verify_ref("feature").await.unwrap().unwrap();
    let target = git.verify_ref("main").await.unwrap().unwrap();
    let base = git
        .merge_base(current.as_str(), target.as_str())
        .await
        .unwrap()
        .unwrap();

    let classifier = ConflictClassifier::new(
        &git,
        ScanCommits {
            base,
            current,
            target,
        },
    );
    let verdict = classifier.classify("new.txt").await.unwrap();
    assert_eq!(verdict.kind, ConflictKind::CreateDeleteConflict);
}

/// Paths git would C-quote (non-ASCII) or that carry edge whitespace are
/// classified under their real names.
#[tokio::test]
async fn test_non_ascii_and_padded_paths_conflict() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[
            ("café.txt", Some("1\n")),
            (" padded.txt", Some("1\n")),
            ("plain.txt", Some("1\n")),
        ],
        &[
            ("café.txt", Some("2\n")),
            (" padded.txt", Some("2\n")),
            ("plain.txt", Some("2\n")),
        ],
        &[
            ("café.txt", Some("3\n")),
            (" padded.txt", Some("3\n")),
            ("plain.txt", Some("3\n")),
        ],
    );

    let engine = make_engine();
    let outcome = engine.scan(&scan_request(&dir, "main")).await.unwrap();
    assert_eq!(
        verdict_kinds(&outcome),
        vec![
            (" padded.txt".to_string(), ConflictKind::ContentConflict),
            ("café.txt".to_string(), ConflictKind::ContentConflict),
            ("plain.txt".to_string(), ConflictKind::ContentConflict),
        ]
    );

    let workdir = dir.canonicalize().unwrap();
    assert!(engine.registry().is_conflicted(&workdir.join("café.txt")));
    assert!(engine.registry().is_conflicted(&workdir.join(" padded.txt")));
    assert_eq!(engine.registry().list_conflicted().len(), 3);
}

/// A path that is a directory on the target side is absent there, not a
/// blob, so the edit reads as modify/delete.
#[tokio::test]
async fn test_path_replaced_by_directory_is_absent() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("thing", Some("1\n"))],
        &[("thing", Some("2\n"))],
        &[("thing", None), ("thing/inner.txt", Some("x\n"))],
    );

    let git = GitCli::new(&dir, Duration::from_secs(15));
    let current = git.verify_ref("feature").await.unwrap().unwrap();
    let target = git.verify_ref("main").await.unwrap().unwrap();
    assert!(git.blob_exists(&current, "thing").await.unwrap());
    assert!(!git.blob_exists(&target, "thing").await.unwrap());
    assert!(git.blob_exists(&target, "thing/inner.txt").await.unwrap());

    let outcome = make_engine()
        .scan(&scan_request(&dir, "main"))
        .await
        .unwrap();
    let verdict = outcome
        .verdicts()
        .iter()
        .find(|v| v.path == "thing")
        .expect("thing is a candidate");
    assert_eq!(verdict.kind, ConflictKind::ContentConflict);
    let evidence = verdict.evidence.as_ref().unwrap();
    assert_eq!(evidence.current_text, "2");
    assert_eq!(evidence.target_text, "");
}

/// An unresolvable target aborts the scan and leaves the registry alone.
#[tokio::test]
async fn test_unknown_target_leaves_registry_untouched() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("f.txt", Some("2\n"))],
        &[("f.txt", Some("3\n"))],
    );

    let engine = make_engine();
    engine.scan(&scan_request(&dir, "main")).await.unwrap();
    let before = engine.registry().list_conflicted();
    let generation = engine.registry().generation();
    assert_eq!(before.len(), 1);

    let err = engine
        .scan(&scan_request(&dir, "no-such-branch"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::RefNotFound(ref name) if name == "no-such-branch"));
    assert_eq!(engine.registry().list_conflicted(), before);
    assert_eq!(engine.registry().generation(), generation);
    assert_eq!(engine.registry().configured_target().as_deref(), Some("main"));
}

// ===========================================================================
// Properties
// ===========================================================================

/// Scanning against the checked-out commit yields nothing.
#[tokio::test]
async fn test_identical_commits_yield_empty_set() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("f.txt", Some("2\n"))],
        &[("f.txt", Some("3\n"))],
    );

    let outcome = make_engine()
        .scan(&scan_request(&dir, "feature"))
        .await
        .unwrap();
    assert!(matches!(outcome, ScanOutcome::Completed(_)));
    assert!(outcome.verdicts().is_empty());
}

/// Two scans of an unchanged repository agree.
#[tokio::test]
async fn test_scans_are_deterministic() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[
            ("a.txt", Some("1\n")),
            ("b.txt", Some("1\n")),
            ("src/c.rs", Some("fn c() {}\n")),
        ],
        &[
            ("a.txt", Some("2\n")),
            ("b.txt", Some("2\n")),
            ("src/c.rs", Some("fn c() { 1 }\n")),
        ],
        &[
            ("a.txt", Some("3\n")),
            ("b.txt", Some("2\n")),
            ("src/c.rs", None),
        ],
    );

    let engine = make_engine();
    let first = engine.scan(&scan_request(&dir, "main")).await.unwrap();
    let second = engine.scan(&scan_request(&dir, "main")).await.unwrap();
    assert_eq!(verdict_kinds(&first), verdict_kinds(&second));
    assert_eq!(first.verdicts().len(), 3);
}

// ===========================================================================
// Resolution and localization
// ===========================================================================

/// A name that only exists on the remote resolves to the remote ref.
#[tokio::test]
async fn test_remote_branch_resolution() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("1\n"))],
        &[("f.txt", Some("2\n"))],
        &[("f.txt", Some("3\n"))],
    );
    let main_sha = git(&dir, &["rev-parse", "main"]);
    git(&dir, &["update-ref", "refs/remotes/origin/develop", &main_sha]);

    let branch = make_engine()
        .resolve_branch(&dir, "develop")
        .await
        .unwrap();
    assert_eq!(branch.name, "origin/develop");
    assert_eq!(branch.kind, RefKind::Remote);
    assert_eq!(branch.commit.as_str(), main_sha);
}

/// The conflicting line is located in the live document.
#[tokio::test]
async fn test_document_lines_are_located() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let dir = setup_repo(
        &tmp,
        &[("f.txt", Some("header\nvalue = 1\nfooter\n"))],
        &[("f.txt", Some("header\nvalue = 2\nfooter\n"))],
        &[("f.txt", Some("header\nvalue = 3\nfooter\n"))],
    );

    let request = ScanRequest {
        document: Some(dir.join("f.txt")),
        ..scan_request(&dir, "main")
    };
    let outcome = make_engine().scan(&request).await.unwrap();
    let report = outcome.report().unwrap();
    match &report.document_lines {
        Some(LineLocation::Lines { ranges }) => {
            assert_eq!(ranges.len(), 1);
            assert_eq!((ranges[0].start, ranges[0].end), (1, 1));
        }
        other => panic!("expected located lines, got {:?}", other),
    }
}

/// Outside any repository the scan is a no-op.
#[tokio::test]
async fn test_outside_repository_is_no_repository() {
    let tmp = TempDir::new().unwrap();
    let outcome = make_engine()
        .scan(&scan_request(tmp.path(), "main"))
        .await
        .unwrap();
    assert!(matches!(outcome, ScanOutcome::NoRepository));
}
