//! TOML-based configuration for premerge.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a usable configuration. A small set of values can be
//! overridden from the environment via [`AppConfig::apply_env_overrides`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Environment variable overriding `scan.target_branch`.
pub const ENV_TARGET_BRANCH: &str = "PREMERGE_TARGET_BRANCH";
/// Environment variable overriding `scan.remote`.
pub const ENV_REMOTE: &str = "PREMERGE_REMOTE";

const MAX_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// What to compare against and how to run git.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Line localization settings.
    #[serde(default)]
    pub locator: LocatorConfig,

    /// Settings for the long-running `watch` mode.
    #[serde(default)]
    pub watch: WatchConfig,
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Which ref the current branch is compared against.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Compare against the configured target branch.
    #[default]
    Target,
    /// Compare against the current branch's counterpart on the remote.
    Upstream,
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target => write!(f, "target"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

/// Scan pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Branch the current branch would be merged into (default `main`).
    #[serde(default = "default_target_branch")]
    pub target_branch: String,

    /// Remote used for `<remote>/<name>` resolution (default `origin`).
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Comparison mode.
    #[serde(default)]
    pub compare: CompareMode,

    /// Upper bound for a single git invocation, in seconds (default 15).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_target_branch() -> String {
    "main".into()
}
fn default_remote() -> String {
    "origin".into()
}
fn default_command_timeout() -> u64 {
    15
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_branch: default_target_branch(),
            remote: default_remote(),
            compare: CompareMode::default(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl ScanConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Line localization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// How many lines on either side of a divergence index are searched in
    /// the live document (default 5).
    #[serde(default = "default_search_window")]
    pub search_window: usize,
}

fn default_search_window() -> usize {
    5
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            search_window: default_search_window(),
        }
    }
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

/// Polling settings for `premerge watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between scan triggers (default 10).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Location of the per-user config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("premerge").join("config.toml"))
    }

    /// Load `path` when given; otherwise the per-user file when it exists;
    /// otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load_from_file(p),
                _ => {
                    debug!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Apply `PREMERGE_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(branch) = read_override(ENV_TARGET_BRANCH, "scan.target_branch") {
            self.scan.target_branch = branch;
        }
        if let Some(remote) = read_override(ENV_REMOTE, "scan.remote") {
            self.scan.remote = remote;
        }
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.target_branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "scan.target_branch".into(),
                detail: "target branch must not be empty".into(),
            });
        }
        if self.scan.remote.trim().is_empty() || self.scan.remote.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "scan.remote".into(),
                detail: "remote must be a non-empty name without '/'".into(),
            });
        }
        if self.scan.command_timeout_secs == 0 || self.scan.command_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(ConfigError::InvalidValue {
                field: "scan.command_timeout_secs".into(),
                detail: format!("timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
            });
        }
        if self.watch.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watch.poll_interval_secs".into(),
                detail: "poll interval must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, apply overrides, and validate in one call.
    pub fn load_and_resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML (used by `premerge init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

fn read_override(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => {
            debug!(field, env_name, "applying env override");
            Some(val.trim().to_string())
        }
        Ok(_) => {
            warn!(field, env_name, "env override is set but empty, ignoring");
            None
        }
        Err(_) => None,
    }
}
