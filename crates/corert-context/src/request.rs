use std::time::Instant;

use corert_ids::{SpanID, TraceID};
use serde_json::Value;
use std::sync::Mutex;

/// Closed set of request kinds (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    RPCCall,
    AuthHandler,
    PubSubMessage,
    Test,
    CustomSpan,
    Unknown,
}

impl Default for RequestKind {
    fn default() -> Self {
        RequestKind::Unknown
    }
}

/// Kind-specific sub-record carried by a [`Request`] (spec.md §3: "one of
/// {RPC payload, pubsub payload, test payload} sub-records").
#[derive(Debug, Clone, Default)]
pub enum RequestPayload {
    Rpc {
        service: String,
        endpoint: String,
        http_method: String,
        path: String,
        path_params: Vec<(String, String)>,
        headers: Vec<(String, String)>,
    },
    Pubsub {
        topic: String,
        subscription: String,
        message_id: String,
        attempt: u32,
    },
    Test {
        test_name: String,
    },
    #[default]
    None,
}

/// The unit of tracked work (spec.md §3). Created with a fresh [`SpanID`];
/// lineage fields default to zero/empty and are filled in by
/// [`crate::RequestTracker::begin_request`]'s copy-from-parent rules.
#[derive(Debug)]
pub struct Request {
    pub kind: RequestKind,
    pub trace_id: TraceID,
    pub span_id: SpanID,
    pub parent_span_id: SpanID,
    pub parent_trace_id: TraceID,
    pub caller_event_id: Option<u64>,
    pub ext_correlation_id: String,
    pub start: Instant,
    pub traced: bool,
    pub svc_num: u16,
    pub payload: RequestPayload,
    pub user_id: String,
    pub auth_data: Option<Value>,
    pub logger: tracing::Span,
    /// Stack of active custom spans within this request (spec.md §4.6
    /// `PushSpan`/`PopSpan`); start-events emitted while non-empty use the
    /// top entry as parent instead of the request's own span id.
    span_stack: Mutex<Vec<SpanID>>,
    finished: std::sync::atomic::AtomicBool,
}

impl Request {
    /// A fresh request of `kind`, with a newly generated span id. All
    /// lineage fields start at zero/empty; call
    /// [`crate::RequestTracker::begin_request`] to inherit from a current
    /// parent request, if any.
    pub fn new(kind: RequestKind) -> Self {
        Request {
            kind,
            trace_id: TraceID::zero(),
            span_id: corert_ids::gen_span_id(),
            parent_span_id: SpanID::zero(),
            parent_trace_id: TraceID::zero(),
            caller_event_id: None,
            ext_correlation_id: String::new(),
            start: Instant::now(),
            traced: false,
            svc_num: 0,
            payload: RequestPayload::None,
            user_id: String::new(),
            auth_data: None,
            logger: tracing::Span::none(),
            span_stack: Mutex::new(Vec::new()),
            finished: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn push_span(&self, span_id: SpanID) {
        self.span_stack.lock().unwrap().push(span_id);
    }

    pub fn pop_span(&self) {
        self.span_stack.lock().unwrap().pop();
    }

    /// The span subsequent events should reference: the top of the custom
    /// span stack if non-empty, otherwise the request's own span id.
    pub fn current_span(&self) -> SpanID {
        self.span_stack.lock().unwrap().last().copied().unwrap_or(self.span_id)
    }

    pub(crate) fn mark_finished(&self) -> bool {
        !self.finished.swap(true, std::sync::atomic::Ordering::SeqCst)
    }
}
