//! Facade crate wiring the focused runtime crates (C1–C12) into the one
//! thing a service process actually embeds, mirroring the role the
//! top-level `libdatadog` crate plays for the teacher workspace: a thin
//! aggregation point, not a place for new logic.

use std::sync::Arc;

use corert_config::ConfigStore;
use corert_context::RequestTracker;
use corert_errors::Error as StructuredError;
use corert_metrics::Registry;
use corert_shutdown::Process;

/// Everything a service process needs at its seams: request/trace
/// propagation, metrics, configuration, and graceful shutdown. Built
/// once at process start via [`Runtime::bootstrap`] and shared for the
/// life of the process.
pub struct Runtime {
    pub tracker: RequestTracker,
    pub metrics: Registry,
    pub config: Arc<ConfigStore>,
    pub process: Process,
}

impl Runtime {
    /// Installs the process-wide `tracing` subscriber and builds a
    /// `Runtime` for a process hosting `services`: one metrics service
    /// slot and one `ENCORE_CFG_<SERVICE>` configuration blob per name.
    pub fn bootstrap(services: &[&str]) -> Self {
        corert_observability::init_tracing();
        Runtime {
            tracker: RequestTracker::new(tracing::info_span!("encore_runtime")),
            metrics: Registry::new(services.len()),
            config: ConfigStore::from_env(services),
            process: Process::new(),
        }
    }

    /// Builds a `Runtime` with no process-wide subscriber installed and
    /// no configuration blobs read from the environment — for tests that
    /// want the wiring without touching global or process state.
    pub fn for_test() -> Self {
        Runtime {
            tracker: RequestTracker::new(tracing::info_span!("encore_runtime_test")),
            metrics: Registry::new(0),
            config: ConfigStore::empty(),
            process: Process::new(),
        }
    }

    /// Finishes the current request with a structured error attached to
    /// its closing span-end event (spec.md §4.4/§4.6), a thin pass-through
    /// kept here so callers reach for one facade type instead of
    /// `corert-context` and `corert-errors` separately at the RPC
    /// boundary.
    pub fn finish_request_with_error(&self, finish_op: bool, err: &StructuredError) {
        self.tracker.finish_request_with_error(finish_op, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_test_wires_a_runtime_with_no_ambient_state() {
        let rt = Runtime::for_test();
        let current = rt.tracker.current();
        assert!(current.request.is_none());
        assert_eq!(rt.config.value("billing", "max_retries", |v| v.as_i64().unwrap_or(0)).get(), 0);
    }

    #[tokio::test]
    async fn shutdown_with_no_outstanding_work_resolves_immediately() {
        let rt = Runtime::for_test();
        let code = rt.process.shutdown(std::time::Duration::from_millis(50), std::time::Duration::from_millis(200), &[]).await;
        assert_eq!(code, 0);
    }
}
