use std::fmt::Display;

/// Marks a violated programming invariant (double-finish of a request, an
/// odd-length metadata pair list, a negative counter delta, ...) as a fatal
/// bug rather than a recoverable error.
///
/// These conditions can only happen if a caller misuses the API; per
/// spec.md §7 they are surfaced immediately rather than threaded through as
/// a `Result`.
#[track_caller]
pub fn bug(msg: impl Display) -> ! {
    panic!("programming error: {msg}")
}
