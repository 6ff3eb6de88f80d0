//! TraceID/SpanID generation and text encoding (spec.md C2).
//!
//! Trace ids are 16 random bytes, span ids are 8 random bytes; an all-zero
//! value means "unset" for both. A process-wide test-mode flag, toggled for
//! the duration of a single test via [`test_mode`], forces both generators
//! to return the deterministic value `{0, 0, ..., 0, 1}`.

use std::sync::atomic::{AtomicBool, Ordering};

mod base32;

/// 16-byte trace identifier. Zero means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TraceID(pub [u8; 16]);

/// 8-byte span identifier. Zero means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpanID(pub [u8; 8]);

impl TraceID {
    pub const fn zero() -> Self {
        TraceID([0; 16])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }

    /// Lowercase base32 (no padding) text form, alphabet
    /// `0123456789abcdefghijklmnopqrstuv`.
    pub fn to_base32(&self) -> String {
        base32::encode(&self.0)
    }

    pub fn from_base32(s: &str) -> Option<Self> {
        let bytes = base32::decode(s)?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(TraceID(arr))
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex_decode(s)?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(TraceID(arr))
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl std::fmt::Display for TraceID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_base32())
    }
}

impl SpanID {
    pub const fn zero() -> Self {
        SpanID([0; 8])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex_decode(s)?;
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(SpanID(arr))
    }

    pub fn from_u64_be(v: u64) -> Self {
        SpanID(v.to_be_bytes())
    }
}

impl std::fmt::Display for SpanID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

static TEST_MODE: AtomicBool = AtomicBool::new(false);

/// Deterministic id returned by both generators while test mode is active.
const TEST_VALUE_TAIL: u8 = 1;

/// Enables the deterministic test-mode generator for as long as the
/// returned guard is alive.
///
/// ```
/// let _guard = corert_ids::test_mode();
/// assert_eq!(corert_ids::gen_trace_id().to_base32(), corert_ids::gen_trace_id().to_base32());
/// ```
pub fn test_mode() -> TestModeGuard {
    TEST_MODE.store(true, Ordering::SeqCst);
    TestModeGuard(())
}

/// RAII guard returned by [`test_mode`]; restores normal (random) id
/// generation when dropped.
pub struct TestModeGuard(());

impl Drop for TestModeGuard {
    fn drop(&mut self) {
        TEST_MODE.store(false, Ordering::SeqCst);
    }
}

fn deterministic<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    out[N - 1] = TEST_VALUE_TAIL;
    out
}

/// Generates a fresh 16-byte trace id from a CSPRNG, or the deterministic
/// test value if [`test_mode`] is active.
pub fn gen_trace_id() -> TraceID {
    if TEST_MODE.load(Ordering::SeqCst) {
        return TraceID(deterministic());
    }
    TraceID(rand::random())
}

/// Generates a fresh 8-byte span id from a CSPRNG, or the deterministic
/// test value if [`test_mode`] is active.
pub fn gen_span_id() -> SpanID {
    if TEST_MODE.load(Ordering::SeqCst) {
        return SpanID(deterministic());
    }
    SpanID(rand::random())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_detection() {
        assert!(TraceID::zero().is_zero());
        assert!(SpanID::zero().is_zero());
        assert!(!gen_trace_id().is_zero() || TEST_MODE.load(Ordering::SeqCst));
    }

    #[test]
    fn base32_round_trip() {
        let id = TraceID([0xaf; 16]);
        let text = id.to_base32();
        assert_eq!(text.to_lowercase(), text);
        assert_eq!(TraceID::from_base32(&text), Some(id));
    }

    #[test]
    fn hex_round_trip_matches_seed_scenario() {
        // Scenario 1 from spec.md §8: X-Cloud-Trace-Context hex decodes
        // straight into the 16 trace id bytes.
        let id = TraceID::from_hex("0af7651916cd43dd8448eb211c80319c").expect("valid 32-hex trace id");
        assert_eq!(id.to_hex(), "0af7651916cd43dd8448eb211c80319c");
    }

    #[test]
    fn span_id_from_decimal_big_endian() {
        let span = SpanID::from_u64_be(1234);
        assert_eq!(span.0, [0, 0, 0, 0, 0, 0, 0x04, 0xd2]);
    }

    #[test]
    fn test_mode_is_deterministic_and_scoped() {
        {
            let _g = test_mode();
            assert_eq!(gen_trace_id().0, deterministic::<16>());
            assert_eq!(gen_span_id().0, deterministic::<8>());
        }
        assert!(!TEST_MODE.load(Ordering::SeqCst));
    }
}
