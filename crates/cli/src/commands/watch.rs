//! `premerge watch`: periodic scans through the single-flight scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tracing::{info, warn};

use premerge_core::config::AppConfig;
use premerge_core::scan_engine::ScanEngine;
use premerge_core::scheduler::{ScanEvent, ScanScheduler, TriggerOutcome};
use premerge_core::ConflictRegistry;

use super::{request, TargetArgs};
use crate::commands::scan::describe_lines;
use crate::signals;
use crate::style;

pub async fn run_watch(
    config: AppConfig,
    repo: &Path,
    document: Option<PathBuf>,
    target: TargetArgs,
) -> Result<()> {
    let target = target.resolve(&config);
    let poll_interval = Duration::from_secs(config.watch.poll_interval_secs);

    let registry = Arc::new(ConflictRegistry::new());
    registry.configure_target(&target.label());
    let engine = Arc::new(ScanEngine::new(config, Arc::clone(&registry)));
    let scheduler = ScanScheduler::new(engine);
    let mut events = scheduler.subscribe();
    let scan_request = request(repo, document, target.clone());

    println!(
        "{}",
        style::header(&format!(
            "Watching {} against {} every {}s (Ctrl+C to stop)",
            repo.display(),
            target,
            poll_interval.as_secs()
        ))
    );
    info!(
        poll_interval_secs = poll_interval.as_secs(),
        scan_target = %target,
        "watch started"
    );

    let mut interval = time::interval(poll_interval);
    let shutdown = signals::wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if scheduler.trigger(scan_request.clone()) == TriggerOutcome::Coalesced {
                    warn!("previous scan still running, rerun queued");
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, &registry),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                println!("{}", style::dim("Stopping…"));
                break;
            }
        }
    }

    scheduler.wait_idle().await;
    info!("watch stopped");
    Ok(())
}

fn print_event(event: &ScanEvent, registry: &ConflictRegistry) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match event {
        ScanEvent::Started { run, .. } => {
            println!("{}", style::dim(&format!("[{now}] scan #{run} started")));
        }
        ScanEvent::Completed {
            run,
            report: Some(report),
            ..
        } => {
            let conflicted = registry.list_conflicted();
            if conflicted.is_empty() {
                println!(
                    "{}",
                    style::success(&format!("[{now}] scan #{run}: no conflicts"))
                );
            } else {
                println!(
                    "{}",
                    style::warn(&format!(
                        "[{now}] scan #{run}: {} file(s) would conflict",
                        conflicted.len()
                    ))
                );
                for path in &conflicted {
                    println!("    {}", path.display());
                }
            }
            if let Some(lines) = &report.document_lines {
                println!("    {}", style::dim(&describe_lines(lines)));
            }
        }
        ScanEvent::Completed { run, report: None, .. } => {
            println!(
                "{}",
                style::warn(&format!("[{now}] scan #{run}: not inside a git repository"))
            );
        }
        ScanEvent::Failed {
            run,
            error,
            indeterminate: true,
            ..
        } => {
            println!(
                "{}",
                style::warn(&format!("[{now}] scan #{run} could not determine: {error}"))
            );
        }
        ScanEvent::Failed { run, error, .. } => {
            println!(
                "{}",
                style::error(&format!("[{now}] scan #{run} failed: {error}"))
            );
        }
        ScanEvent::Discarded { run, reason, .. } => {
            println!(
                "{}",
                style::dim(&format!("[{now}] scan #{run} discarded ({reason})"))
            );
        }
    }
}
