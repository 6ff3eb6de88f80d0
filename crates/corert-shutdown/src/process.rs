use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel_context::CancelContext;
use crate::task_counter::{TaskCounter, TaskGuard};

/// A snapshot of the four cancellation contexts (spec.md §3
/// `ShutdownProgress`), handed to registered shutdown handlers so they
/// can block on any subset of them.
pub struct ShutdownProgress {
    pub outstanding_requests: Arc<CancelContext>,
    pub outstanding_pubsub_messages: Arc<CancelContext>,
    pub force_close_tasks: Arc<CancelContext>,
    pub force_shutdown: Arc<CancelContext>,
}

/// A resource that needs a chance to close cleanly before the process
/// exits (spec.md §4.12 phase 2, `Handler.Shutdown(progress)`).
pub trait ShutdownHandler: Send + Sync {
    fn shutdown<'a>(&'a self, progress: &'a ShutdownProgress) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Owns the four cascaded cancellation contexts and drives the
/// three-phase shutdown sequence (spec.md §4.12).
pub struct Process {
    requests: Arc<TaskCounter>,
    pubsub: Arc<TaskCounter>,
    force_close_tasks: Arc<CancelContext>,
    force_shutdown: Arc<CancelContext>,
}

impl Default for Process {
    fn default() -> Self {
        Self::new()
    }
}

impl Process {
    pub fn new() -> Self {
        Process {
            requests: Arc::new(TaskCounter::new()),
            pubsub: Arc::new(TaskCounter::new()),
            force_close_tasks: Arc::new(CancelContext::new()),
            force_shutdown: Arc::new(CancelContext::new()),
        }
    }

    pub fn begin_request(&self) -> Option<TaskGuard> {
        self.requests.try_begin()
    }

    pub fn begin_pubsub_message(&self) -> Option<TaskGuard> {
        self.pubsub.try_begin()
    }

    pub fn outstanding_requests(&self) -> &CancelContext {
        self.requests.context().as_ref()
    }

    pub fn outstanding_pubsub_messages(&self) -> &CancelContext {
        self.pubsub.context().as_ref()
    }

    pub fn force_close_tasks(&self) -> &CancelContext {
        &self.force_close_tasks
    }

    pub fn force_shutdown(&self) -> &CancelContext {
        &self.force_shutdown
    }

    /// Resolves once both task counters have resolved (spec.md §3
    /// "OutstandingTasks resolves when both request and pubsub contexts
    /// have resolved").
    async fn outstanding_tasks_done(&self) {
        tokio::join!(self.requests.context().done(), self.pubsub.context().done());
    }

    /// Runs the three-phase shutdown (spec.md §4.12) and returns the
    /// process exit code: 0 iff every phase resolved before its
    /// deadline, 1 otherwise.
    pub async fn shutdown(&self, drain_deadline: Duration, total_deadline: Duration, handlers: &[Arc<dyn ShutdownHandler>]) -> i32 {
        tracing::info!(?drain_deadline, ?total_deadline, "shutdown initiated");

        // Phase 1: drain.
        self.requests.begin_drain();
        self.pubsub.begin_drain();
        let drained = tokio::time::timeout(drain_deadline, self.outstanding_tasks_done()).await.is_ok();
        self.force_close_tasks.resolve();
        if !drained {
            tracing::warn!("drain deadline elapsed with outstanding tasks remaining");
        }

        // Phase 2: resource close. Hands handlers the real, shared
        // contexts rather than disconnected copies, so a handler blocking
        // on `outstanding_requests` unblocks the moment the underlying
        // counter actually resolves, including after the drain deadline.
        let progress = ShutdownProgress {
            outstanding_requests: self.requests.context().clone(),
            outstanding_pubsub_messages: self.pubsub.context().clone(),
            force_close_tasks: self.force_close_tasks.clone(),
            force_shutdown: self.force_shutdown.clone(),
        };
        let remaining = total_deadline.saturating_sub(drain_deadline);
        let closed = tokio::time::timeout(remaining, run_handlers(handlers, &progress)).await.is_ok();
        if !closed {
            tracing::warn!("resource close did not finish before the total shutdown deadline");
        }

        // Phase 3: exit.
        self.force_shutdown.resolve();

        if drained && closed {
            0
        } else {
            1
        }
    }
}

async fn run_handlers(handlers: &[Arc<dyn ShutdownHandler>], progress: &ShutdownProgress) {
    for handler in handlers {
        handler.shutdown(progress).await;
    }
}
