//! Single-flight scan scheduling.
//!
//! At most one scan runs per [`ScanKey`]. Triggers that arrive while a scan
//! for the same key is running are coalesced into exactly one trailing rerun,
//! started as soon as the running scan finishes. Progress is published as
//! [`ScanEvent`]s on a broadcast channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::errors::ScanError;
use crate::models::ScanReport;
use crate::scan_engine::{ScanEngine, ScanOutcome, ScanRequest, ScanTarget};

const EVENT_CAPACITY: usize = 64;

/// Anything that can run a scan; implemented by [`ScanEngine`].
#[async_trait]
pub trait Scanner: Send + Sync + 'static {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, ScanError>;
}

#[async_trait]
impl Scanner for ScanEngine {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome, ScanError> {
        ScanEngine::scan(self, request).await
    }
}

/// Identity of a scan for single-flight purposes: the document (or the
/// workspace root when there is none) and the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanKey {
    pub subject: PathBuf,
    pub target: ScanTarget,
}

impl ScanKey {
    pub fn for_request(request: &ScanRequest) -> Self {
        Self {
            subject: request
                .document
                .clone()
                .unwrap_or_else(|| request.workspace_root.clone()),
            target: request.target.clone(),
        }
    }
}

impl std::fmt::Display for ScanKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.subject.display(), self.target)
    }
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        key: ScanKey,
        run: u64,
    },
    /// `report` is `None` when no repository encloses the workspace.
    Completed {
        key: ScanKey,
        run: u64,
        report: Option<Arc<ScanReport>>,
    },
    /// `indeterminate` is set when git never finished (timeout, missing
    /// binary) or the scan task died, rather than git reporting a failure.
    Failed {
        key: ScanKey,
        run: u64,
        error: String,
        indeterminate: bool,
    },
    Discarded {
        key: ScanKey,
        run: u64,
        reason: String,
    },
}

/// What [`ScanScheduler::trigger`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new scan was started.
    Started,
    /// A scan for the key is running; a rerun is queued behind it.
    Coalesced,
}

struct Inner {
    scanner: Arc<dyn Scanner>,
    /// Keys with a scan in flight, mapped to the queued rerun (if any).
    in_flight: Mutex<HashMap<ScanKey, Option<ScanRequest>>>,
    idle: Notify,
    events: broadcast::Sender<ScanEvent>,
    runs: AtomicU64,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<ScanKey, Option<ScanRequest>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ScanEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Cheap to clone; clones share the same in-flight table.
#[derive(Clone)]
pub struct ScanScheduler {
    inner: Arc<Inner>,
}

impl ScanScheduler {
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                scanner,
                in_flight: Mutex::new(HashMap::new()),
                idle: Notify::new(),
                events,
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.inner.events.subscribe()
    }

    /// Number of keys with a scan running.
    pub fn in_flight(&self) -> usize {
        self.inner.slots().len()
    }

    /// Start a scan for `request`, or queue a rerun if one is running for
    /// the same key. Must be called within a tokio runtime.
    pub fn trigger(&self, request: ScanRequest) -> TriggerOutcome {
        let key = ScanKey::for_request(&request);
        {
            let mut slots = self.inner.slots();
            if let Some(pending) = slots.get_mut(&key) {
                debug!(key = %key, "scan in flight, coalescing trigger");
                *pending = Some(request);
                return TriggerOutcome::Coalesced;
            }
            slots.insert(key.clone(), None);
        }

        tokio::spawn(drive(Arc::clone(&self.inner), key, request));
        TriggerOutcome::Started
    }

    /// Resolves once no scan is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Run scans for `key` until no rerun is queued.
async fn drive(inner: Arc<Inner>, key: ScanKey, mut request: ScanRequest) {
    loop {
        run_once(&inner, &key, request).await;

        let mut slots = inner.slots();
        match slots.get_mut(&key).and_then(Option::take) {
            Some(next) => {
                debug!(key = %key, "running coalesced rerun");
                request = next;
            }
            None => {
                slots.remove(&key);
                if slots.is_empty() {
                    inner.idle.notify_waiters();
                }
                return;
            }
        }
    }
}

async fn run_once(inner: &Arc<Inner>, key: &ScanKey, request: ScanRequest) {
    let run = inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
    info!(run, key = %key, "starting scan");
    inner.publish(ScanEvent::Started {
        key: key.clone(),
        run,
    });

    // A panicking scan surfaces as a join error instead of wedging the key.
    let scanner = Arc::clone(&inner.scanner);
    let result = tokio::spawn(async move { scanner.scan(&request).await }).await;

    let event = match result {
        Ok(Ok(ScanOutcome::Completed(report))) => {
            info!(
                run,
                conflicted = report.conflicts().count(),
                "scan completed"
            );
            ScanEvent::Completed {
                key: key.clone(),
                run,
                report: Some(Arc::new(report)),
            }
        }
        Ok(Ok(ScanOutcome::NoRepository)) => ScanEvent::Completed {
            key: key.clone(),
            run,
            report: None,
        },
        Ok(Ok(ScanOutcome::Discarded(reason))) => {
            warn!(run, %reason, "scan discarded");
            ScanEvent::Discarded {
                key: key.clone(),
                run,
                reason: reason.to_string(),
            }
        }
        Ok(Err(e)) => {
            let indeterminate = e.is_indeterminate();
            error!(run, error = %e, indeterminate, "scan failed");
            ScanEvent::Failed {
                key: key.clone(),
                run,
                error: e.to_string(),
                indeterminate,
            }
        }
        Err(e) => {
            error!(run, error = %e, "scan task aborted");
            ScanEvent::Failed {
                key: key.clone(),
                run,
                error: e.to_string(),
                indeterminate: true,
            }
        }
    };
    inner.publish(event);
}
