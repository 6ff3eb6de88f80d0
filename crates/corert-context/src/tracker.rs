use std::sync::Arc;

use corert_errors::Error as StructuredError;
use corert_ids::SpanID;
use corert_trace::TraceEventLog;

use crate::operation::Operation;
use crate::request::{Request, RequestKind, RequestPayload};
use crate::slot;

/// Snapshot returned by [`RequestTracker::current`] (spec.md §4.6
/// `Current()`).
pub struct Current {
    pub request: Option<Arc<Request>>,
    pub log: Option<Arc<TraceEventLog>>,
    pub goctr: u32,
    pub svc_num: u16,
}

/// Begin/finish operations, begin/finish requests, push/pop custom spans,
/// and copy lineage from a parent request (spec.md C6). Reads and writes
/// the current task's slot ([`crate::slot`]); callers on different tasks
/// never contend, since the slot is task-local.
pub struct RequestTracker {
    root_logger: tracing::Span,
}

impl RequestTracker {
    pub fn new(root_logger: tracing::Span) -> Self {
        RequestTracker { root_logger }
    }

    /// Creates the per-operation state: a goroutine counter seeded at 1,
    /// and — if `traced` — a fresh [`TraceEventLog`].
    pub fn begin_operation(&self, traced: bool) -> Arc<Operation> {
        let op = Arc::new(Operation::new(traced));
        let mut slot = slot::get();
        slot.operation = Some(op.clone());
        slot.goctr = 1;
        slot::set(slot);
        op
    }

    /// If a request is already current on this task, copies parent
    /// lineage fields into `req` wherever `req` left them unset, then
    /// installs `req` as current. Emits the span-start event matching
    /// `req.kind` if the owning operation is traced.
    pub fn begin_request(&self, mut req: Request) -> Arc<Request> {
        let mut slot = slot::get();

        if let Some(parent) = slot.request.clone() {
            copy_from_parent(&mut req, &parent);
        }
        if req.trace_id.is_zero() {
            req.trace_id = corert_ids::gen_trace_id();
        }

        let req = Arc::new(req);

        if let Some(op) = &slot.operation {
            if op.traced && req.traced {
                if let Some(log) = &op.log {
                    emit_span_start(log, &req);
                }
            }
        }

        slot.request = Some(req.clone());
        slot::set(slot);
        req
    }

    /// Pops the current request. If `finish_op` and this was the
    /// operation's root (no request remains current afterwards), marks
    /// the operation's trace log done so a shipment loop waiting on
    /// [`TraceEventLog::wait_until_done`] can proceed.
    ///
    /// Double-finish of the same request is a programming error.
    pub fn finish_request(&self, finish_op: bool) {
        let mut slot = slot::get();
        let req = match slot.request.take() {
            Some(r) => r,
            None => corert_common::bug("finish_request called with no current request"),
        };
        if !req.mark_finished() {
            corert_common::bug("request finished twice");
        }

        let duration = req.start.elapsed();
        if let Some(op) = &slot.operation {
            if op.traced && req.traced {
                if let Some(log) = &op.log {
                    emit_span_end(log, &req, duration, None);
                }
            }
        }

        if finish_op {
            if let Some(op) = slot.operation.take() {
                if let Some(log) = &op.log {
                    log.mark_done();
                }
            }
        }
        slot::set(slot);
    }

    /// Finishes the request with a structured error attached to its
    /// closing span-end event (spec.md §4.4 `RequestSpanEnd` etc. carry
    /// error-with-stack).
    pub fn finish_request_with_error(&self, finish_op: bool, err: &StructuredError) {
        let mut slot = slot::get();
        let req = match slot.request.take() {
            Some(r) => r,
            None => corert_common::bug("finish_request called with no current request"),
        };
        if !req.mark_finished() {
            corert_common::bug("request finished twice");
        }

        let duration = req.start.elapsed();
        if let Some(op) = &slot.operation {
            if op.traced && req.traced {
                if let Some(log) = &op.log {
                    emit_span_end(log, &req, duration, Some(err));
                }
            }
        }

        if finish_op {
            if let Some(op) = slot.operation.take() {
                if let Some(log) = &op.log {
                    log.mark_done();
                }
            }
        }
        slot::set(slot);
    }

    /// Pushes `span_id` onto the current request's custom-span stack;
    /// start-events emitted while it is non-empty reference the top entry
    /// as their parent instead of the request's own span id.
    pub fn push_span(&self, span_id: SpanID) {
        let slot = slot::get();
        if let Some(req) = &slot.request {
            req.push_span(span_id);
        }
    }

    pub fn pop_span(&self) {
        let slot = slot::get();
        if let Some(req) = &slot.request {
            req.pop_span();
        }
    }

    pub fn current(&self) -> Current {
        let slot = slot::get();
        Current {
            request: slot.request,
            log: slot.operation.and_then(|op| op.log.clone()),
            goctr: slot.goctr,
            svc_num: slot.svc_num,
        }
    }

    /// The current request's logger, or the root logger if no request is
    /// current.
    pub fn logger(&self) -> tracing::Span {
        slot::get().request.map(|r| r.logger.clone()).unwrap_or_else(|| self.root_logger.clone())
    }
}

/// Copy-from-parent rules, verbatim per spec.md §4.6.
fn copy_from_parent(child: &mut Request, parent: &Request) {
    let inherits_user_identity =
        matches!(child.kind, RequestKind::RPCCall) || matches!(parent.kind, RequestKind::Test);
    if inherits_user_identity {
        if child.user_id.is_empty() {
            child.user_id = parent.user_id.clone();
        }
        if child.auth_data.is_none() {
            child.auth_data = parent.auth_data.clone();
        }
    }
    if child.trace_id.is_zero() {
        child.trace_id = parent.trace_id;
    }
    if child.parent_span_id.is_zero() {
        child.parent_span_id = parent.span_id;
    }
    if child.ext_correlation_id.is_empty() {
        child.ext_correlation_id = parent.ext_correlation_id.clone();
    }
    if !child.traced && parent.traced {
        child.traced = true;
    }
}

fn emit_span_start(log: &TraceEventLog, req: &Request) {
    match (&req.kind, &req.payload) {
        (RequestKind::RPCCall, RequestPayload::Rpc { service, endpoint, http_method, path, path_params, headers }) => {
            let path_params: Vec<(&str, &str)> = path_params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            let headers: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            log.request_span_start(
                req.trace_id,
                req.span_id,
                req.parent_trace_id,
                req.parent_span_id,
                req.caller_event_id,
                &req.ext_correlation_id,
                service,
                endpoint,
                http_method,
                path,
                &path_params,
                &headers,
                &[],
                &req.user_id,
            );
        }
        (RequestKind::AuthHandler, _) => {
            log.auth_span_start(
                req.trace_id,
                req.span_id,
                req.parent_trace_id,
                req.parent_span_id,
                req.caller_event_id,
                &req.ext_correlation_id,
                "",
                "",
                &[],
                &[],
            );
        }
        (RequestKind::PubSubMessage, RequestPayload::Pubsub { topic, subscription, message_id, attempt }) => {
            log.pubsub_message_span_start(
                req.trace_id,
                req.span_id,
                req.parent_trace_id,
                req.parent_span_id,
                req.caller_event_id,
                &req.ext_correlation_id,
                topic,
                subscription,
                message_id,
                *attempt,
                &[],
            );
        }
        (RequestKind::Test, RequestPayload::Test { test_name }) => {
            log.test_span_start(
                req.trace_id,
                req.span_id,
                req.parent_trace_id,
                req.parent_span_id,
                req.caller_event_id,
                &req.ext_correlation_id,
                test_name,
            );
        }
        _ => {
            log.custom_span_start(
                req.trace_id,
                req.span_id,
                req.parent_trace_id,
                req.parent_span_id,
                req.caller_event_id,
                &req.ext_correlation_id,
                "unknown",
                &[],
            );
        }
    }
}

fn emit_span_end(log: &TraceEventLog, req: &Request, duration: std::time::Duration, err: Option<&StructuredError>) {
    match req.kind {
        RequestKind::RPCCall => {
            log.request_span_end(req.trace_id, req.span_id, duration, err, 200);
        }
        RequestKind::AuthHandler => {
            log.auth_span_end(req.trace_id, req.span_id, duration, err, &req.user_id);
        }
        RequestKind::PubSubMessage => {
            log.pubsub_message_span_end(req.trace_id, req.span_id, duration, err);
        }
        RequestKind::Test => {
            log.test_span_end(req.trace_id, req.span_id, duration, err, err.is_some());
        }
        RequestKind::CustomSpan | RequestKind::Unknown => {
            log.custom_span_end(req.trace_id, req.span_id, duration, err, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot;

    fn new_tracker() -> RequestTracker {
        RequestTracker::new(tracing::Span::none())
    }

    #[tokio::test]
    async fn begin_request_generates_trace_id_when_zero_and_no_parent() {
        slot::scope(async {
            let tracker = new_tracker();
            tracker.begin_operation(false);
            let req = tracker.begin_request(Request::new(RequestKind::Unknown));
            assert!(!req.trace_id.is_zero());
        })
        .await;
    }

    #[tokio::test]
    async fn child_inherits_trace_id_and_parent_span_id() {
        slot::scope(async {
            let tracker = new_tracker();
            tracker.begin_operation(false);
            let parent = tracker.begin_request(Request::new(RequestKind::Unknown));
            let parent_trace = parent.trace_id;
            let parent_span = parent.span_id;

            let child = tracker.begin_request(Request::new(RequestKind::CustomSpan));
            assert_eq!(child.trace_id, parent_trace);
            assert_eq!(child.parent_span_id, parent_span);
        })
        .await;
    }

    #[tokio::test]
    async fn traced_promotes_from_parent() {
        slot::scope(async {
            let tracker = new_tracker();
            tracker.begin_operation(true);
            let mut parent_req = Request::new(RequestKind::Unknown);
            parent_req.traced = true;
            let _parent = tracker.begin_request(parent_req);

            let child = tracker.begin_request(Request::new(RequestKind::CustomSpan));
            assert!(child.traced);
        })
        .await;
    }

    #[tokio::test]
    #[should_panic(expected = "programming error")]
    async fn double_finish_is_a_bug() {
        slot::scope(async {
            let tracker = new_tracker();
            tracker.begin_operation(false);
            tracker.begin_request(Request::new(RequestKind::Unknown));
            tracker.finish_request(true);
            tracker.finish_request(true);
        })
        .await;
    }

    #[tokio::test]
    async fn push_pop_span_changes_current_span() {
        slot::scope(async {
            let tracker = new_tracker();
            tracker.begin_operation(false);
            let req = tracker.begin_request(Request::new(RequestKind::Unknown));
            let custom = corert_ids::gen_span_id();
            tracker.push_span(custom);
            assert_eq!(req.current_span(), custom);
            tracker.pop_span();
            assert_eq!(req.current_span(), req.span_id);
        })
        .await;
    }
}
