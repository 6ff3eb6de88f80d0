//! A growable byte buffer with typed append operations (spec.md C1).
//!
//! Every write here only grows the buffer; there is no fallible path for
//! callers to handle; the wire-side reader must parse by the same grammar
//! documented on each `write_*` method.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One stack frame as written into the error-with-stack grammar.
#[derive(Debug, Clone, Copy)]
pub struct ErrFrame<'a> {
    pub file: &'a str,
    pub line: i64,
    pub function: &'a str,
}

/// A growable, append-only byte buffer with the primitives the trace event
/// payload grammar is built from.
#[derive(Debug, Default)]
pub struct EventBuf {
    buf: Vec<u8>,
}

impl EventBuf {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Pre-sizes the buffer using a caller-provided hint. The hint is only
    /// ever a capacity hint: callers must not assume it was accurate, and
    /// writes past it simply reallocate like any `Vec`.
    pub fn with_extra_space(extra_space: usize) -> Self {
        Self {
            buf: Vec::with_capacity(extra_space),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hands back the accumulated bytes and truncates the buffer to empty,
    /// matching `TraceEventLog::GetAndClear` (spec.md C4).
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Raw bytes, unprefixed.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    /// LEB128 unsigned varint.
    pub fn write_uvarint(&mut self, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                break;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Zigzag-encoded signed varint.
    pub fn write_varint(&mut self, v: i64) {
        let zigzag = ((v << 1) ^ (v >> 63)) as u64;
        self.write_uvarint(zigzag);
    }

    pub fn write_u32_be(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64_be(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Length-prefixed (uvarint) UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_uvarint(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Length-prefixed (uvarint) byte-string.
    pub fn write_byte_string(&mut self, b: &[u8]) {
        self.write_uvarint(b.len() as u64);
        self.buf.extend_from_slice(b);
    }

    /// Duration, written as nanoseconds in a signed varint.
    pub fn write_duration(&mut self, d: Duration) {
        self.write_varint(d.as_nanos() as i64);
    }

    /// Wall-clock time, written as nanoseconds-since-epoch in a signed
    /// varint.
    pub fn write_time(&mut self, t: SystemTime) {
        let nanos = t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_else(|e| -(e.duration().as_nanos() as i64));
        self.write_varint(nanos);
    }

    /// Error-with-stack: a nullable header (one byte, 0 = absent, 1 =
    /// present) followed by the message string, a frame count, then per
    /// frame (file string, line varint, function name string).
    ///
    /// `None` writes a single null byte and nothing else, per spec.md §4.1
    /// / §7 (`ErrWithStack`: nil -> single null byte).
    pub fn write_err_with_stack(&mut self, err: Option<(&str, &[ErrFrame<'_>])>) {
        match err {
            None => self.buf.push(0),
            Some((msg, frames)) => {
                self.buf.push(1);
                self.write_string(msg);
                self.write_uvarint(frames.len() as u64);
                for frame in frames {
                    self.write_string(frame.file);
                    self.write_varint(frame.line);
                    self.write_string(frame.function);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uvarint_round_trips_via_manual_decode() {
        let mut buf = EventBuf::new();
        buf.write_uvarint(300);
        // 300 = 0b1_0010_1100 -> low7=0101100|cont, high=10
        assert_eq!(buf.as_slice(), &[0b1010_1100, 0b0000_0010]);
    }

    #[test]
    fn varint_zigzag_small_negative() {
        let mut buf = EventBuf::new();
        buf.write_varint(-1);
        assert_eq!(buf.as_slice(), &[1]);
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut buf = EventBuf::new();
        buf.write_string("hi");
        assert_eq!(buf.as_slice(), &[2, b'h', b'i']);
    }

    #[test]
    fn nil_error_is_single_null_byte() {
        let mut buf = EventBuf::new();
        buf.write_err_with_stack(None);
        assert_eq!(buf.as_slice(), &[0]);
    }

    #[test]
    fn error_with_stack_grammar() {
        let mut buf = EventBuf::new();
        let frames = [ErrFrame { file: "a.rs", line: 10, function: "f" }];
        buf.write_err_with_stack(Some(("boom", &frames)));
        let bytes = buf.into_vec();
        assert_eq!(bytes[0], 1);
    }

    #[test]
    fn extra_space_hint_is_only_a_hint() {
        let mut buf = EventBuf::with_extra_space(1);
        for i in 0..100u64 {
            buf.write_uvarint(i);
        }
        assert!(buf.len() > 1);
    }

    #[test]
    fn take_empties_buffer() {
        let mut buf = EventBuf::new();
        buf.write_bytes(b"abc");
        let out = buf.take();
        assert_eq!(out, b"abc");
        assert!(buf.is_empty());
    }
}
