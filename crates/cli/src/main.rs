//! premerge command-line tool.
//!
//! Provides subcommands for scanning the current branch against a target for
//! anticipated merge conflicts, inspecting branch resolution and conflict
//! line ranges, watching a repository, and generating / validating
//! configuration files.

mod commands;
mod signals;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use premerge_core::config::AppConfig;
use premerge_core::errors::ScanError;

use commands::{ScanArgs, TargetArgs};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// premerge command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "premerge",
    version,
    about = "Anticipate merge conflicts against a target branch before merging"
)]
struct Cli {
    /// Path to the TOML configuration file (default: the per-user config
    /// file when present, otherwise built-in defaults).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory inside the repository to scan.
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log level override: trace, debug, info, warn, error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the current branch against the target for conflicts.
    Scan(ScanArgs),

    /// Show which ref a branch name resolves to.
    Resolve {
        /// Branch name to resolve.
        name: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show the conflicting line ranges of one file.
    Lines {
        /// File to locate conflicts in.
        document: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Rescan on an interval until interrupted.
    Watch {
        /// File whose conflict lines are reported on each scan.
        #[arg(short, long)]
        document: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./premerge.toml")]
        output: PathBuf,
    },

    /// Validate the configuration.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            if e
                .downcast_ref::<ScanError>()
                .is_some_and(ScanError::is_indeterminate)
            {
                eprintln!(
                    "{}",
                    style::warn(
                        "Could not determine conflicts: git did not finish. \
                         Consider raising scan.command_timeout_secs."
                    )
                );
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            commands::config::run_init(&output)
        }
        Commands::Validate => {
            init_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            commands::config::run_validate(cli.config.as_deref())
        }
        command => {
            let config = load_config(cli.config.as_deref())?;
            let default_level = match command {
                Commands::Watch { .. } => config.watch.log_level.clone(),
                _ => "warn".to_string(),
            };
            init_tracing(cli.log_level.as_deref().unwrap_or(&default_level));

            match command {
                Commands::Scan(args) => commands::scan::run_scan(config, &cli.repo, args).await,
                Commands::Resolve { name, json } => {
                    commands::scan::run_resolve(config, &cli.repo, &name, json).await
                }
                Commands::Lines {
                    document,
                    target,
                    json,
                } => commands::scan::run_lines(config, &cli.repo, &document, target, json).await,
                Commands::Watch { document, target } => {
                    commands::watch::run_watch(config, &cli.repo, document, target).await
                }
                Commands::Init { .. } | Commands::Validate => Ok(()),
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration")
}
