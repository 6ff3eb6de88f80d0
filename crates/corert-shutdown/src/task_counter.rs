use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::cancel_context::CancelContext;

/// Tracks outstanding work of one kind (requests, or pubsub messages) and
/// resolves its [`CancelContext`] once draining has begun and the count
/// returns to zero (spec.md §4.12 phase 1).
pub struct TaskCounter {
    count: AtomicI64,
    draining: AtomicBool,
    context: Arc<CancelContext>,
}

impl Default for TaskCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskCounter {
    pub fn new() -> Self {
        TaskCounter { count: AtomicI64::new(0), draining: AtomicBool::new(false), context: Arc::new(CancelContext::new()) }
    }

    /// The same `Arc` this counter resolves — shared, not copied, so a
    /// caller handing it to [`crate::process::ShutdownProgress`] sees the
    /// real resolution rather than a disconnected snapshot.
    pub fn context(&self) -> &Arc<CancelContext> {
        &self.context
    }

    /// Admits new work unless draining has begun — new inbound work is
    /// refused once phase 1 starts (spec.md §4.12).
    pub fn try_begin(self: &Arc<Self>) -> Option<TaskGuard> {
        if self.draining.load(Ordering::SeqCst) {
            return None;
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Some(TaskGuard { counter: self.clone() })
    }

    /// Begins draining: no `try_begin` call after this succeeds. Resolves
    /// the context immediately if the count is already zero.
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
        if self.count.load(Ordering::SeqCst) == 0 {
            self.context.resolve();
        }
    }

    fn finish_one(&self) {
        let remaining = self.count.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.draining.load(Ordering::SeqCst) {
            self.context.resolve();
        }
    }
}

/// RAII handle for one piece of outstanding work; dropping it (on every
/// exit path) decrements the counter.
pub struct TaskGuard {
    counter: Arc<TaskCounter>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.counter.finish_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_with_no_outstanding_work_resolves_immediately() {
        let counter = Arc::new(TaskCounter::new());
        counter.begin_drain();
        assert!(counter.context().is_resolved());
    }

    #[test]
    fn drain_waits_for_outstanding_work_to_finish() {
        let counter = Arc::new(TaskCounter::new());
        let guard = counter.try_begin().unwrap();
        counter.begin_drain();
        assert!(!counter.context().is_resolved());
        drop(guard);
        assert!(counter.context().is_resolved());
    }

    #[test]
    fn try_begin_refuses_new_work_once_draining() {
        let counter = Arc::new(TaskCounter::new());
        counter.begin_drain();
        assert!(counter.try_begin().is_none());
    }

    #[test]
    fn new_work_before_drain_is_admitted() {
        let counter = Arc::new(TaskCounter::new());
        let guard = counter.try_begin();
        assert!(guard.is_some());
    }
}
