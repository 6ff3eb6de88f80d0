//! Inbound trace-context header extraction (spec.md C7).
//!
//! Best-effort: a malformed header is logged and skipped rather than
//! failing the request. A zero pair means "start a fresh trace", the same
//! fallback [`crate::ExtractedContext::is_empty`] reports.

use corert_ids::{SpanID, TraceID};
use http::HeaderMap;

/// `{TraceID, SpanID}`, either of which may be zero (spec.md §4.7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractedContext {
    pub trace_id: TraceID,
    pub span_id: SpanID,
}

impl ExtractedContext {
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_zero() && self.span_id.is_zero()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Extracts trace context from an inbound header set, trying each scheme
/// in the fixed precedence order of spec.md §4.7 and returning on the
/// first that parses.
pub fn extract(headers: &HeaderMap) -> ExtractedContext {
    if let Some(v) = header_str(headers, "x-cloud-trace-context") {
        if let Some(ctx) = parse_cloud_trace_context(v) {
            return ctx;
        }
        tracing::debug!(value = v, "malformed X-Cloud-Trace-Context header, skipping");
    }

    if let Some(v) = header_str(headers, "x-amzn-trace-id") {
        if let Some(ctx) = parse_amzn_trace_id(v) {
            return ctx;
        }
        tracing::debug!(value = v, "malformed X-Amzn-Trace-Id header, skipping");
    }

    if let (Some(t), Some(s)) = (header_str(headers, "x-b3-traceid"), header_str(headers, "x-b3-spanid")) {
        if let Some(ctx) = parse_b3_pair(t, s) {
            return ctx;
        }
        tracing::debug!(trace = t, span = s, "malformed X-B3-* headers, skipping");
    }

    if let Some(v) = header_str(headers, "b3") {
        if let Some(ctx) = parse_b3_single(v) {
            return ctx;
        }
        tracing::debug!(value = v, "malformed b3 header, skipping");
    }

    if let Some(v) = header_str(headers, "traceparent") {
        if let Some(ctx) = parse_traceparent(v) {
            return ctx;
        }
        tracing::debug!(value = v, "malformed traceparent header, skipping");
    }

    ExtractedContext::default()
}

/// `<32-hex>/<decimal-span>[;o=...]`.
fn parse_cloud_trace_context(v: &str) -> Option<ExtractedContext> {
    let (trace_hex, rest) = v.split_once('/')?;
    let span_decimal = rest.split(';').next()?;
    let trace_id = TraceID::from_hex(trace_hex)?;
    let span_num: u64 = span_decimal.parse().ok()?;
    Some(ExtractedContext { trace_id, span_id: SpanID::from_u64_be(span_num) })
}

/// `Root=<version>-<hex8>-<hex24>[;Parent=...][;Sampled=...]`.
fn parse_amzn_trace_id(v: &str) -> Option<ExtractedContext> {
    let root = v.split(';').find_map(|part| part.trim().strip_prefix("Root="))?;
    let mut segments = root.split('-');
    let _version = segments.next()?;
    let high = segments.next()?;
    let low = segments.next()?;
    if high.len() != 8 || low.len() != 24 {
        return None;
    }
    let trace_id = TraceID::from_hex(&format!("{high}{low}"))?;
    Some(ExtractedContext { trace_id, span_id: SpanID::zero() })
}

fn parse_b3_pair(trace_hex: &str, span_hex: &str) -> Option<ExtractedContext> {
    if trace_hex.len() != 32 || span_hex.len() != 16 {
        return None;
    }
    let trace_id = TraceID::from_hex(trace_hex)?;
    let span_id = SpanID::from_hex(span_hex)?;
    Some(ExtractedContext { trace_id, span_id })
}

/// `<hex-trace>-<hex-span>-<sampled>-<parent-span>`, only the first two
/// fields are required.
fn parse_b3_single(v: &str) -> Option<ExtractedContext> {
    let mut parts = v.split('-');
    let trace_hex = parts.next()?;
    let span_hex = parts.next()?;
    parse_b3_pair(trace_hex, span_hex)
}

/// W3C `traceparent`: `<ver>-<32-hex-trace>-<16-hex-span>-<flags>`. Only
/// the TraceID is extracted (spec.md §4.7 item 5).
fn parse_traceparent(v: &str) -> Option<ExtractedContext> {
    let mut parts = v.split('-');
    let _version = parts.next()?;
    let trace_hex = parts.next()?;
    let _span_hex = parts.next()?;
    let _flags = parts.next()?;
    if trace_hex.len() != 32 {
        return None;
    }
    let trace_id = TraceID::from_hex(trace_hex)?;
    Some(ExtractedContext { trace_id, span_id: SpanID::zero() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                http::HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn seed_scenario_1_cloud_trace_context() {
        let h = headers(&[("x-cloud-trace-context", "0af7651916cd43dd8448eb211c80319c/1234;o=1")]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(ctx.span_id.0, [0, 0, 0, 0, 0, 0, 0x04, 0xd2]);
    }

    #[test]
    fn precedence_prefers_cloud_trace_over_traceparent() {
        let h = headers(&[
            ("x-cloud-trace-context", "0af7651916cd43dd8448eb211c80319c/1234"),
            ("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        ]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
    }

    #[test]
    fn traceparent_extracts_trace_id_only() {
        let h = headers(&[("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert!(ctx.span_id.is_zero());
    }

    #[test]
    fn malformed_header_is_skipped_not_fatal() {
        let h = headers(&[("x-cloud-trace-context", "not-a-valid-header")]);
        let ctx = extract(&h);
        assert!(ctx.is_empty());
    }

    #[test]
    fn b3_pair_requires_correct_lengths() {
        let h = headers(&[
            ("x-b3-traceid", "0af7651916cd43dd8448eb211c80319c"),
            ("x-b3-spanid", "00f067aa0ba902b7"),
        ]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(ctx.span_id.to_hex(), "00f067aa0ba902b7");
    }

    #[test]
    fn b3_single_header() {
        let h = headers(&[("b3", "0af7651916cd43dd8448eb211c80319c-00f067aa0ba902b7-1")]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(ctx.span_id.to_hex(), "00f067aa0ba902b7");
    }

    #[test]
    fn amzn_trace_id_header() {
        let h = headers(&[("x-amzn-trace-id", "Root=1-5e1b4151-5ac6c0f4c8f73e35e8b4c05c")]);
        let ctx = extract(&h);
        assert_eq!(ctx.trace_id.to_hex(), "5e1b41515ac6c0f4c8f73e35e8b4c05c");
        assert!(ctx.span_id.is_zero());
    }
}
