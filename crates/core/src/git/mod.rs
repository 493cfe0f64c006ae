//! Git operations for premerge.

pub mod client;
pub mod merge_tree;
pub mod plumbing;
pub mod repo;

pub use client::{CommandOutput, GitCli};
pub use plumbing::GitPlumbing;
pub use repo::RepoLocation;
