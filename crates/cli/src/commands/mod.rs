//! Subcommand implementations.

pub mod config;
pub mod scan;
pub mod watch;

use std::path::{Path, PathBuf};

use clap::Args;

use premerge_core::config::AppConfig;
use premerge_core::scan_engine::{ScanRequest, ScanTarget};

/// Target selection shared by every scanning subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Branch to compare against (default: `scan.target_branch`).
    #[arg(short, long, conflicts_with = "upstream")]
    pub target: Option<String>,

    /// Compare against the current branch on the configured remote.
    #[arg(long)]
    pub upstream: bool,
}

impl TargetArgs {
    /// Command-line choice first, then the configured compare mode.
    pub fn resolve(&self, config: &AppConfig) -> ScanTarget {
        if self.upstream {
            return ScanTarget::Upstream;
        }
        match &self.target {
            Some(name) => ScanTarget::Branch(name.clone()),
            None => ScanTarget::from_config(config),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// File whose conflict lines should be reported.
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Print the full scan report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn request(repo: &Path, document: Option<PathBuf>, target: ScanTarget) -> ScanRequest {
    ScanRequest {
        workspace_root: repo.to_path_buf(),
        document,
        target,
    }
}
