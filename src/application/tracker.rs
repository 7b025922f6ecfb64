use crate::domain::payment::{CorrelationId, Route};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Notify, mpsc};

/// Terminal state of an admitted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Charged through `route`. `persisted` is false when the durable write
    /// failed after the upstream success.
    Settled { route: Route, persisted: bool },
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub correlation_id: CorrelationId,
    pub attempts: u32,
    pub terminal: Terminal,
}

/// Snapshot of the tracker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub admitted: u64,
    pub settled_primary: u64,
    pub settled_fallback: u64,
    pub dropped: u64,
    pub persistence_failures: u64,
}

impl DispatchStats {
    pub fn terminal(&self) -> u64 {
        self.settled_primary + self.settled_fallback + self.dropped
    }

    pub fn in_flight(&self) -> u64 {
        self.admitted.saturating_sub(self.terminal())
    }
}

/// Counts admissions and terminal outcomes so callers can tell when the
/// pipeline has drained.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    admitted: AtomicU64,
    settled_primary: AtomicU64,
    settled_fallback: AtomicU64,
    dropped: AtomicU64,
    persistence_failures: AtomicU64,
    idle: Notify,
    reports: Mutex<Option<mpsc::UnboundedSender<DispatchReport>>>,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts streaming every terminal report to the returned receiver.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DispatchReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut reports) = self.reports.lock() {
            *reports = Some(tx);
        }
        rx
    }

    pub(crate) fn record_admission(&self) {
        self.admitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Undoes an admission whose enqueue did not go through.
    pub(crate) fn retract_admission(&self) {
        self.admitted.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    pub(crate) fn finish(&self, report: DispatchReport) {
        match report.terminal {
            Terminal::Settled { route, persisted } => {
                if !persisted {
                    self.persistence_failures.fetch_add(1, Ordering::SeqCst);
                }
                match route {
                    Route::Primary => self.settled_primary.fetch_add(1, Ordering::SeqCst),
                    Route::Fallback => self.settled_fallback.fetch_add(1, Ordering::SeqCst),
                };
            }
            Terminal::Dropped => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }

        if let Ok(reports) = self.reports.lock()
            && let Some(tx) = reports.as_ref()
        {
            let _ = tx.send(report);
        }
        self.idle.notify_waiters();
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            admitted: self.admitted.load(Ordering::SeqCst),
            settled_primary: self.settled_primary.load(Ordering::SeqCst),
            settled_fallback: self.settled_fallback.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
            persistence_failures: self.persistence_failures.load(Ordering::SeqCst),
        }
    }

    /// Resolves once every admitted request has reached a terminal state.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.stats().in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
