use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A cancellation context that resolves exactly once (spec.md §3
/// `ShutdownProgress`). Mirrors the done-flag/`Notify` pairing
/// `corert_trace::TraceEventLog` uses for its own one-shot completion
/// signal.
#[derive(Default)]
pub struct CancelContext {
    resolved: AtomicBool,
    notify: Notify,
}

impl CancelContext {
    pub fn new() -> Self {
        CancelContext { resolved: AtomicBool::new(false), notify: Notify::new() }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    /// Idempotent: only the first call actually flips the flag and wakes
    /// waiters.
    pub fn resolve(&self) {
        if !self.resolved.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Resolves when `resolve()` is (or was already) called.
    pub async fn done(&self) {
        loop {
            if self.is_resolved() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_resolved() {
                return;
            }
            notified.await;
        }
    }
}
