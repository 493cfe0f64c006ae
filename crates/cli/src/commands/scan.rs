//! One-shot scans: `scan`, `lines` and `resolve`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use premerge_core::config::AppConfig;
use premerge_core::models::{LineLocation, ScanReport};
use premerge_core::scan_engine::{ScanEngine, ScanOutcome};
use premerge_core::ConflictRegistry;

use super::{request, ScanArgs, TargetArgs};
use crate::style;

fn engine(config: AppConfig) -> ScanEngine {
    ScanEngine::new(config, Arc::new(ConflictRegistry::new()))
}

/// Run one scan and print every candidate's verdict.
pub async fn run_scan(config: AppConfig, repo: &Path, args: ScanArgs) -> Result<()> {
    let target = args.target.resolve(&config);
    let engine = engine(config);
    let outcome = engine
        .scan(&request(repo, args.document, target.clone()))
        .await
        .with_context(|| format!("scan against '{}' failed", target))?;

    if args.json {
        return print_json(&outcome);
    }

    let report = match outcome {
        ScanOutcome::Completed(report) => report,
        ScanOutcome::NoRepository => {
            println!("{}", style::warn("Not inside a git repository; nothing to scan"));
            return Ok(());
        }
        ScanOutcome::Discarded(reason) => {
            println!("{}", style::warn(&format!("Scan result discarded ({reason})")));
            return Ok(());
        }
    };

    print_summary(&report);
    if report.verdicts.is_empty() {
        println!("{}", style::success("No files changed on both sides"));
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Verdict", "Probe"]);
    for verdict in &report.verdicts {
        let probe = verdict
            .probe
            .map(|p| p.to_string())
            .unwrap_or_else(|| "—".to_string());
        table.add_row(vec![
            Cell::new(&verdict.path),
            Cell::new(style::verdict(verdict.kind)),
            Cell::new(probe),
        ]);
    }
    println!("{}", table);
    println!();

    let conflicted = report.conflicts().count();
    if conflicted == 0 {
        println!("{}", style::success("No conflicts anticipated"));
    } else {
        println!(
            "{}",
            style::warn(&format!("{conflicted} file(s) would conflict"))
        );
    }

    if let (Some(document), Some(lines)) = (&report.document, &report.document_lines) {
        println!(
            "  {} {}",
            style::dim(&format!("{}:", document.display())),
            describe_lines(lines)
        );
    }
    println!();

    Ok(())
}

/// Print only the conflict line ranges of `document`.
pub async fn run_lines(
    config: AppConfig,
    repo: &Path,
    document: &Path,
    target: TargetArgs,
    json: bool,
) -> Result<()> {
    let target = target.resolve(&config);
    let engine = engine(config);
    let outcome = engine
        .scan(&request(repo, Some(document.to_path_buf()), target.clone()))
        .await
        .with_context(|| format!("scan against '{}' failed", target))?;

    let lines = outcome.report().and_then(|r| r.document_lines.clone());
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    match lines {
        Some(lines) => println!("{}", describe_lines(&lines)),
        None => println!(
            "{}",
            style::success(&format!("No content conflict in {}", document.display()))
        ),
    }
    Ok(())
}

/// Print the ref a branch name resolves to.
pub async fn run_resolve(config: AppConfig, repo: &Path, name: &str, json: bool) -> Result<()> {
    let engine = engine(config);
    let branch = engine
        .resolve_branch(repo, name)
        .await
        .with_context(|| format!("failed to resolve '{}'", name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&branch)?);
        return Ok(());
    }

    println!("  Name   : {}", branch.name);
    println!("  Kind   : {}", branch.kind);
    println!("  Commit : {}", branch.commit);
    Ok(())
}

fn print_json(outcome: &ScanOutcome) -> Result<()> {
    let value = match outcome {
        ScanOutcome::Completed(report) => serde_json::to_value(report)?,
        ScanOutcome::NoRepository => serde_json::json!({ "status": "no_repository" }),
        ScanOutcome::Discarded(reason) => {
            serde_json::json!({ "status": "discarded", "reason": reason })
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!();
    println!(
        "{}",
        style::header(&format!(
            "{} → {}",
            report.current.name, report.target.name
        ))
    );
    println!(
        "{}",
        style::dim(&format!(
            "merge base {} · {} candidate(s) · scan {}",
            report.merge_base.short(),
            report.verdicts.len(),
            report.scan_id
        ))
    );
    println!();
}

pub fn describe_lines(lines: &LineLocation) -> String {
    match lines {
        LineLocation::Lines { ranges } => {
            let parts: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
            format!("lines {}", parts.join(", "))
        }
        LineLocation::WholeDocument { line_count } => {
            format!("whole file ({line_count} lines)")
        }
    }
}
