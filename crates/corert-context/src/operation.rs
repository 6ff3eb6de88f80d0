use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use corert_trace::TraceEventLog;

/// The outermost tracked unit (spec.md glossary: "Operation"); wraps one or
/// more nested requests. Created by [`crate::RequestTracker::begin_operation`].
pub struct Operation {
    pub traced: bool,
    pub log: Option<Arc<TraceEventLog>>,
    goctr: AtomicU32,
}

impl Operation {
    pub fn new(traced: bool) -> Self {
        Operation {
            traced,
            log: if traced { Some(Arc::new(TraceEventLog::new())) } else { None },
            goctr: AtomicU32::new(1),
        }
    }

    /// Atomically bumps the goroutine-counter and returns the new value,
    /// used when a task spawns a child task under this operation.
    pub fn next_goctr(&self) -> u32 {
        self.goctr.fetch_add(1, Ordering::SeqCst) + 1
    }
}
