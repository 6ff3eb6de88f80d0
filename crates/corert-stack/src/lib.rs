//! Bounded call-stack capture (spec.md C3).
//!
//! Capture stops once it has collected [`MAX_FRAMES`] frames above the
//! starting depth, or once it reaches a frame recorded in the process-wide
//! stop-frame cache. A PC is added to that cache the first time it is seen
//! and its symbol name contains [`STOP_SENTINEL`] — the same one-shot
//! learning approach the teacher's crash collector uses when walking
//! `backtrace::Frame`s (see `crashtracker/src/collectors.rs`), just without
//! the signal-safety constraints of a crash handler.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::sync::Mutex;

/// Frames beyond this count above the starting depth are never captured.
pub const MAX_FRAMES: usize = 101;

/// Substring that marks a frame as an internal boundary; once seen, its PC
/// is cached and future captures truncate there.
pub const STOP_SENTINEL: &str = "__encore_";

/// A single resolved frame, ready to be written into the error-with-stack
/// wire grammar (`corert_eventbuf::ErrFrame`).
#[derive(Debug, Clone)]
pub struct Frame {
    pub file: String,
    pub line: i64,
    pub function: String,
}

/// The result of [`capture`]: the frames collected, and the base address of
/// the module the outermost frame belongs to (used by consumers that want
/// to map addresses back to a binary on disk).
#[derive(Debug, Clone, Default)]
pub struct CapturedStack {
    pub frames: Vec<Frame>,
    pub module_base_offset: u64,
    pub truncated: bool,
}

fn stop_set() -> &'static Mutex<HashSet<usize>> {
    static STOP: OnceLock<Mutex<HashSet<usize>>> = OnceLock::new();
    STOP.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Captures up to [`MAX_FRAMES`] frames, skipping `start_depth` frames
/// closest to the caller (so callers can hide their own helper functions),
/// and applying `exclude` to additionally drop frames (e.g. language
/// runtime frames) from the *formatted* output without affecting the depth
/// budget consumed while walking.
pub fn capture(start_depth: usize, exclude: impl Fn(&str) -> bool) -> CapturedStack {
    let mut raw_frames: Vec<(usize, u64)> = Vec::new();
    let mut depth = 0usize;
    let mut module_base_offset = 0u64;
    let mut truncated = false;

    backtrace::trace(|frame| {
        if depth < start_depth {
            depth += 1;
            return true;
        }
        let pc = frame.ip() as usize;
        if let Some(base) = frame.module_base_address() {
            if module_base_offset == 0 {
                module_base_offset = base as u64;
            }
        }

        if stop_set().lock().unwrap().contains(&pc) {
            truncated = true;
            return false;
        }

        raw_frames.push((pc, frame.symbol_address() as u64));
        depth += 1;
        raw_frames.len() < MAX_FRAMES
    });
    if raw_frames.len() >= MAX_FRAMES {
        truncated = true;
    }

    let mut frames = Vec::with_capacity(raw_frames.len());
    for (pc, _symbol_addr) in &raw_frames {
        let mut name = None;
        let mut file = None;
        let mut line = None;
        backtrace::resolve(*pc as *mut std::ffi::c_void, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
            if file.is_none() {
                file = symbol.filename().map(|p| p.display().to_string());
            }
            if line.is_none() {
                line = symbol.lineno().map(|l| l as i64);
            }
        });

        let function = name.unwrap_or_else(|| "<unknown>".to_string());
        if function.contains(STOP_SENTINEL) {
            stop_set().lock().unwrap().insert(*pc);
            truncated = true;
            break;
        }
        if exclude(&function) {
            continue;
        }
        frames.push(Frame {
            file: file.unwrap_or_default(),
            line: line.unwrap_or(0),
            function,
        });
    }

    CapturedStack {
        frames,
        module_base_offset,
        truncated,
    }
}

/// Capture with no additional frame filtering.
pub fn capture_all(start_depth: usize) -> CapturedStack {
    capture(start_depth, |_| false)
}

impl CapturedStack {
    /// Borrowed `(file, line, function)` triples, in the shape
    /// [`corert_eventbuf::EventBuf::write_err_with_stack`] wants.
    pub fn as_err_frames(&self) -> Vec<corert_eventbuf::ErrFrame<'_>> {
        self.frames
            .iter()
            .map(|f| corert_eventbuf::ErrFrame {
                file: &f.file,
                line: f.line,
                function: &f.function,
            })
            .collect()
    }
}
