//! Goroutine-local slot (spec.md C5).
//!
//! The scheduling model is parallel tasks cooperating via a shared mutable
//! request context (spec.md §4.5). Rust/tokio has no ambient per-task
//! storage that survives `spawn` for free, so this module builds one on
//! top of [`tokio::task_local!`]: a task-scoped, interior-mutable cell that
//! [`spawn_tracked`] copies into freshly spawned children, bumping the
//! goroutine-counter and emitting `GoStart`/`GoEnd` around the child's
//! lifetime — the fallback spec.md §9 describes for runtimes without a
//! native hook, adapted to the facilities tokio actually exposes.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use corert_ids::{SpanID, TraceID};

use crate::operation::Operation;
use crate::request::Request;

/// The per-task record (spec.md §4.5): current request, its owning
/// operation (carrying the trace log), the goroutine-counter, and the
/// currently executing service number (0 = outside any service).
#[derive(Clone, Default)]
pub struct Slot {
    pub request: Option<Arc<Request>>,
    pub operation: Option<Arc<Operation>>,
    pub goctr: u32,
    pub svc_num: u16,
}

tokio::task_local! {
    static SLOT: RefCell<Slot>;
}

/// Current per-task record, or the empty default if no request is active
/// on this task (or this task was not spawned under [`spawn_tracked`] /
/// [`scope`]).
pub fn get() -> Slot {
    SLOT.try_with(|cell| cell.borrow().clone()).unwrap_or_default()
}

/// Installs `slot` as the current task's record. Must be called from
/// within a [`scope`]d future (directly, or one spawned via
/// [`spawn_tracked`]); outside one this is a no-op, matching `get()`'s
/// graceful empty default.
pub fn set(slot: Slot) {
    let _ = SLOT.try_with(|cell| *cell.borrow_mut() = slot);
}

/// Runs `fut` with a fresh, empty slot installed — the entry point for a
/// new root task (e.g. the server shim handling an inbound request).
pub async fn scope<F: Future>(fut: F) -> F::Output {
    SLOT.scope(RefCell::new(Slot::default()), fut).await
}

/// Spawns `fut` as a new tokio task, copying the parent's current slot
/// into it with a bumped goroutine-counter, and emitting
/// `GoStart`/`GoEnd` trace events around its lifetime if the parent's
/// operation is traced (spec.md §4.5).
pub fn spawn_tracked<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let parent = get();
    let child_goctr = parent.operation.as_ref().map(|op| op.next_goctr()).unwrap_or(1);

    let (trace_id, span_id) = parent
        .request
        .as_ref()
        .map(|r| (r.trace_id, r.current_span()))
        .unwrap_or((TraceID::zero(), SpanID::zero()));
    let log = parent.operation.as_ref().and_then(|op| op.log.clone());

    let mut child = parent.clone();
    child.goctr = child_goctr;

    if let Some(log) = &log {
        log.go_start(trace_id, span_id, child_goctr);
    }

    tokio::spawn(async move {
        let out = SLOT.scope(RefCell::new(child), fut).await;
        if let Some(log) = &log {
            log.go_end(trace_id, span_id, child_goctr);
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_outside_scope_is_default() {
        let slot = get();
        assert!(slot.request.is_none());
        assert_eq!(slot.goctr, 0);
    }

    #[tokio::test]
    async fn set_then_get_round_trips_inside_scope() {
        scope(async {
            let mut slot = get();
            slot.svc_num = 3;
            set(slot);
            assert_eq!(get().svc_num, 3);
        })
        .await;
    }

    #[tokio::test]
    async fn spawn_tracked_bumps_goctr_for_child() {
        scope(async {
            let mut slot = get();
            slot.operation = Some(Arc::new(Operation::new(false)));
            slot.goctr = 1;
            set(slot);

            let handle = spawn_tracked(async { get().goctr });
            let child_goctr = handle.await.unwrap();
            assert_eq!(child_goctr, 2);
        })
        .await;
    }
}
