//! `premerge init` and `premerge validate`.

use std::path::Path;

use anyhow::{Context, Result};

use premerge_core::config::AppConfig;

use crate::style;

const HEADER: &str = "\
# premerge configuration
#
# Environment overrides: PREMERGE_TARGET_BRANCH, PREMERGE_REMOTE.
# compare = \"upstream\" compares against <remote>/<current branch> instead
# of target_branch.

";

pub fn run_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let body = AppConfig::default()
        .to_toml()
        .context("failed to render default configuration")?;
    std::fs::write(output, format!("{HEADER}{body}")).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set scan.target_branch to the branch you merge into");
    println!(
        "  2. Validate with: premerge validate --config {}",
        output.display()
    );
    println!("  3. Scan with: premerge scan --config {}", output.display());

    Ok(())
}

pub fn run_validate(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) => println!("Validating configuration: {}", path.display()),
        None => println!("Validating default configuration"),
    }
    println!();

    let mut config =
        AppConfig::load_or_default(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.apply_env_overrides();
    println!("  [OK] Environment overrides applied");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Target branch : {}", config.scan.target_branch);
    println!("  Remote        : {}", config.scan.remote);
    println!("  Compare mode  : {}", config.scan.compare);
    println!("  Git timeout   : {}s", config.scan.command_timeout_secs);
    println!("  Search window : {} lines", config.locator.search_window);
    println!("  Poll interval : {}s", config.watch.poll_interval_secs);
    println!("  Log level     : {}", config.watch.log_level);
    println!();
    println!("{}", style::success("Configuration is valid."));

    Ok(())
}
