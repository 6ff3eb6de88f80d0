use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use corert_eventbuf::EventBuf;
use corert_errors::Error as StructuredError;
use corert_ids::{SpanID, TraceID};
use tokio::sync::Notify;
use tokio::time::timeout;

use crate::anchor::Anchor;
use crate::event_type::{EventType, PointKind};

struct Inner {
    buf: EventBuf,
    next_event_id: u64,
}

/// In-memory, append-only, length-prefixed binary event buffer (spec.md
/// C4). One instance is owned by a root operation for the duration of its
/// lifetime; [`TraceEventLog::get_and_clear`] hands the accumulated bytes
/// to the shipment loop.
pub struct TraceEventLog {
    inner: Mutex<Inner>,
    anchor: Anchor,
    done: AtomicBool,
    done_notify: Notify,
}

impl Default for TraceEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceEventLog {
    pub fn new() -> Self {
        TraceEventLog {
            inner: Mutex::new(Inner {
                buf: EventBuf::new(),
                next_event_id: 1,
            }),
            anchor: Anchor::capture(),
            done: AtomicBool::new(false),
            done_notify: Notify::new(),
        }
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Appends one event under the internal lock, assigning it the next
    /// monotonically increasing event id within this trace. Suspension
    /// never occurs inside the critical section (spec.md §5).
    pub fn add(&self, event_type: EventType, trace_id: TraceID, span_id: SpanID, payload: &[u8]) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let event_id = inner.next_event_id;
        inner.next_event_id += 1;
        inner.buf.write_bytes(&[event_type.as_byte()]);
        inner.buf.write_u64_be(event_id);
        inner.buf.write_bytes(&trace_id.0);
        inner.buf.write_bytes(&span_id.0);
        inner.buf.write_uvarint(payload.len() as u64);
        inner.buf.write_bytes(payload);
        event_id
    }

    /// Hands back the accumulated bytes and truncates the buffer to empty.
    pub fn get_and_clear(&self) -> Vec<u8> {
        self.inner.lock().unwrap().buf.take()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals that the owning operation has finished; wakes any task
    /// parked in [`TraceEventLog::wait_until_done`] / [`Self::wait_at_least`].
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::SeqCst);
        self.done_notify.notify_waiters();
    }

    pub async fn wait_until_done(&self) {
        loop {
            if self.done.load(Ordering::SeqCst) {
                return;
            }
            self.done_notify.notified().await;
        }
    }

    /// Waits for [`Self::mark_done`], or `d` to elapse, whichever first —
    /// lets a shipment loop stream incrementally instead of blocking for
    /// the whole operation.
    pub async fn wait_at_least(&self, d: Duration) {
        let _ = timeout(d, self.wait_until_done()).await;
    }

    /// Writes the error-with-stack grammar from a structured error (spec.md
    /// §7: `ErrWithStack`; nil -> single null byte, non-nil -> joined
    /// message + its captured stack, or an empty stack if none was
    /// captured on the error itself).
    fn write_err_with_stack(buf: &mut EventBuf, err: Option<&StructuredError>) {
        match err {
            None => buf.write_err_with_stack(None),
            Some(e) => {
                let msg = e.joined_message();
                let frames = e.stack.as_ref().map(|s| s.as_err_frames()).unwrap_or_default();
                buf.write_err_with_stack(Some((&msg, &frames)));
            }
        }
    }

    fn write_common_span_start(
        buf: &mut EventBuf,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
    ) {
        buf.write_bytes(&parent_trace_id.0);
        buf.write_bytes(&parent_span_id.0);
        buf.write_bool(caller_event_id.is_some());
        if let Some(id) = caller_event_id {
            buf.write_u64_be(id);
        }
        buf.write_string(ext_correlation_id);
    }

    fn write_kv_pairs(buf: &mut EventBuf, pairs: &[(&str, &str)]) {
        buf.write_uvarint(pairs.len() as u64);
        for (k, v) in pairs {
            buf.write_string(k);
            buf.write_string(v);
        }
    }

    // -- RequestSpan --------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn request_span_start(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
        service: &str,
        endpoint: &str,
        http_method: &str,
        path: &str,
        path_params: &[(&str, &str)],
        headers: &[(&str, &str)],
        payload: &[u8],
        user_id: &str,
    ) -> u64 {
        let mut buf = EventBuf::new();
        Self::write_common_span_start(&mut buf, parent_trace_id, parent_span_id, caller_event_id, ext_correlation_id);
        buf.write_string(service);
        buf.write_string(endpoint);
        buf.write_string(http_method);
        buf.write_string(path);
        Self::write_kv_pairs(&mut buf, path_params);
        Self::write_kv_pairs(&mut buf, headers);
        buf.write_byte_string(payload);
        buf.write_string(user_id);
        self.add(EventType::RequestSpanStart, trace_id, span_id, buf.as_slice())
    }

    pub fn request_span_end(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        duration: Duration,
        err: Option<&StructuredError>,
        http_status: u16,
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        buf.write_uvarint(http_status as u64);
        self.add(EventType::RequestSpanEnd, trace_id, span_id, buf.as_slice())
    }

    // -- AuthSpan -------------------------------------------------------

    pub fn auth_span_start(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
        service: &str,
        auth_handler: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
    ) -> u64 {
        let mut buf = EventBuf::new();
        Self::write_common_span_start(&mut buf, parent_trace_id, parent_span_id, caller_event_id, ext_correlation_id);
        buf.write_string(service);
        buf.write_string(auth_handler);
        Self::write_kv_pairs(&mut buf, headers);
        buf.write_byte_string(payload);
        self.add(EventType::AuthSpanStart, trace_id, span_id, buf.as_slice())
    }

    pub fn auth_span_end(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        duration: Duration,
        err: Option<&StructuredError>,
        user_id: &str,
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        buf.write_string(user_id);
        self.add(EventType::AuthSpanEnd, trace_id, span_id, buf.as_slice())
    }

    // -- PubsubMessageSpan -----------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn pubsub_message_span_start(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
        topic: &str,
        subscription: &str,
        message_id: &str,
        attempt: u32,
        payload: &[u8],
    ) -> u64 {
        let mut buf = EventBuf::new();
        Self::write_common_span_start(&mut buf, parent_trace_id, parent_span_id, caller_event_id, ext_correlation_id);
        buf.write_string(topic);
        buf.write_string(subscription);
        buf.write_string(message_id);
        buf.write_uvarint(attempt as u64);
        buf.write_byte_string(payload);
        self.add(EventType::PubsubMessageSpanStart, trace_id, span_id, buf.as_slice())
    }

    pub fn pubsub_message_span_end(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        duration: Duration,
        err: Option<&StructuredError>,
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        self.add(EventType::PubsubMessageSpanEnd, trace_id, span_id, buf.as_slice())
    }

    // -- CustomSpan -------------------------------------------------------

    pub fn custom_span_start(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
        name: &str,
        payload: &[u8],
    ) -> u64 {
        let mut buf = EventBuf::new();
        Self::write_common_span_start(&mut buf, parent_trace_id, parent_span_id, caller_event_id, ext_correlation_id);
        buf.write_string(name);
        buf.write_byte_string(payload);
        self.add(EventType::CustomSpanStart, trace_id, span_id, buf.as_slice())
    }

    pub fn custom_span_end(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        duration: Duration,
        err: Option<&StructuredError>,
        payload: &[u8],
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        buf.write_byte_string(payload);
        self.add(EventType::CustomSpanEnd, trace_id, span_id, buf.as_slice())
    }

    // -- TestSpan ---------------------------------------------------------

    pub fn test_span_start(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        parent_trace_id: TraceID,
        parent_span_id: SpanID,
        caller_event_id: Option<u64>,
        ext_correlation_id: &str,
        test_name: &str,
    ) -> u64 {
        let mut buf = EventBuf::new();
        Self::write_common_span_start(&mut buf, parent_trace_id, parent_span_id, caller_event_id, ext_correlation_id);
        buf.write_string(test_name);
        self.add(EventType::TestSpanStart, trace_id, span_id, buf.as_slice())
    }

    pub fn test_span_end(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        duration: Duration,
        err: Option<&StructuredError>,
        failed: bool,
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        buf.write_bool(failed);
        self.add(EventType::TestSpanEnd, trace_id, span_id, buf.as_slice())
    }

    // -- Point operations (shared shape, spec.md §4.4) --------------------

    /// `XxxStart → EventID`: the returned id is the correlation key a
    /// matching `point_end` call must pass back.
    pub fn point_start(&self, kind: PointKind, trace_id: TraceID, span_id: SpanID, payload: &[u8]) -> u64 {
        self.add(kind.start_type(), trace_id, span_id, payload)
    }

    /// `XxxEnd(correlation_id, …)`. `correlation_id` must be the id
    /// returned by the matching `point_start` call — this is the only
    /// mechanism used for linking point events.
    pub fn point_end(
        &self,
        kind: PointKind,
        trace_id: TraceID,
        span_id: SpanID,
        correlation_id: u64,
        duration: Duration,
        err: Option<&StructuredError>,
        payload: &[u8],
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_u64_be(correlation_id);
        buf.write_duration(duration);
        Self::write_err_with_stack(&mut buf, err);
        buf.write_byte_string(payload);
        self.add(kind.end_type(), trace_id, span_id, buf.as_slice())
    }

    // -- Unpaired events ---------------------------------------------------

    pub fn log_message(
        &self,
        trace_id: TraceID,
        span_id: SpanID,
        level: &str,
        msg: &str,
        fields: &[(&str, &str)],
    ) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_string(level);
        buf.write_string(msg);
        Self::write_kv_pairs(&mut buf, fields);
        self.add(EventType::LogMessage, trace_id, span_id, buf.as_slice())
    }

    pub fn body_stream(&self, trace_id: TraceID, span_id: SpanID, is_response: bool, chunk: &[u8]) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_bool(is_response);
        buf.write_byte_string(chunk);
        self.add(EventType::BodyStream, trace_id, span_id, buf.as_slice())
    }

    pub fn go_start(&self, trace_id: TraceID, span_id: SpanID, goctr: u32) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_uvarint(goctr as u64);
        self.add(EventType::GoStart, trace_id, span_id, buf.as_slice())
    }

    pub fn go_end(&self, trace_id: TraceID, span_id: SpanID, goctr: u32) -> u64 {
        let mut buf = EventBuf::new();
        buf.write_uvarint(goctr as u64);
        self.add(EventType::GoEnd, trace_id, span_id, buf.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corert_ids::{SpanID, TraceID};

    fn ids() -> (TraceID, SpanID) {
        let _g = corert_ids::test_mode();
        (corert_ids::gen_trace_id(), corert_ids::gen_span_id())
    }

    #[test]
    fn event_ids_strictly_increase_in_append_order() {
        let log = TraceEventLog::new();
        let (t, s) = ids();
        let a = log.add(EventType::LogMessage, t, s, b"");
        let b = log.add(EventType::LogMessage, t, s, b"");
        assert!(a < b);
    }

    #[test]
    fn header_framing_matches_spec_layout() {
        let log = TraceEventLog::new();
        let (t, s) = ids();
        log.add(EventType::LogMessage, t, s, b"hi");
        let bytes = log.get_and_clear();
        assert_eq!(bytes[0], EventType::LogMessage.as_byte());
        let event_id = u64::from_be_bytes(bytes[1..9].try_into().unwrap());
        assert_eq!(event_id, 1);
        assert_eq!(&bytes[9..25], &t.0);
        assert_eq!(&bytes[25..33], &s.0);
        // payload length uvarint(2) then "hi"
        assert_eq!(bytes[33], 2);
        assert_eq!(&bytes[34..36], b"hi");
    }

    #[test]
    fn get_and_clear_truncates_buffer() {
        let log = TraceEventLog::new();
        let (t, s) = ids();
        log.add(EventType::LogMessage, t, s, b"x");
        assert!(!log.is_empty());
        let _ = log.get_and_clear();
        assert!(log.is_empty());
    }

    #[test]
    fn point_start_end_share_correlation_id() {
        let log = TraceEventLog::new();
        let (t, s) = ids();
        let start_id = log.point_start(PointKind::DBQuery, t, s, b"select 1");
        let end_id = log.point_end(PointKind::DBQuery, t, s, start_id, Duration::from_millis(5), None, b"");
        assert!(end_id > start_id);
    }

    #[tokio::test]
    async fn mark_done_wakes_waiter() {
        let log = std::sync::Arc::new(TraceEventLog::new());
        let log2 = log.clone();
        let handle = tokio::spawn(async move {
            log2.wait_until_done().await;
        });
        log.mark_done();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wait_at_least_returns_after_timeout_without_done() {
        let log = TraceEventLog::new();
        let start = std::time::Instant::now();
        log.wait_at_least(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
