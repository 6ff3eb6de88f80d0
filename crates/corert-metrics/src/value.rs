use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use corert_common::bug;

/// The four value types a [`crate::TimeSeries`] can hold (spec.md §3).
/// Histograms are handled separately by [`crate::Histogram`]; this covers
/// the three scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumKind {
    I64,
    U64,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumValue {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl NumValue {
    fn to_bits(self) -> u64 {
        match self {
            NumValue::I64(v) => v as u64,
            NumValue::U64(v) => v,
            NumValue::F64(v) => v.to_bits(),
        }
    }

    fn from_bits(kind: NumKind, bits: u64) -> Self {
        match kind {
            NumKind::I64 => NumValue::I64(bits as i64),
            NumKind::U64 => NumValue::U64(bits),
            NumKind::F64 => NumValue::F64(f64::from_bits(bits)),
        }
    }

    fn kind(self) -> NumKind {
        match self {
            NumValue::I64(_) => NumKind::I64,
            NumValue::U64(_) => NumKind::U64,
            NumValue::F64(_) => NumKind::F64,
        }
    }
}

/// One value slot per bundled service (spec.md §4.10 "Service scoping"),
/// with a validity bit marking whether anything has ever been written to
/// that slot. `svc_num == 0` ("outside any service") writes are silently
/// dropped by the caller before reaching here.
pub struct NumericSeries {
    kind: NumKind,
    slots: Vec<AtomicU64>,
    valid: Vec<AtomicBool>,
    /// Monotonically increasing "first-seen" timestamp, for counters'
    /// cumulative reporting semantics (spec.md §3).
    first_seen: Mutex<Option<SystemTime>>,
}

impl NumericSeries {
    pub fn new(kind: NumKind, num_services: usize) -> Self {
        NumericSeries {
            kind,
            slots: (0..num_services).map(|_| AtomicU64::new(0)).collect(),
            valid: (0..num_services).map(|_| AtomicBool::new(false)).collect(),
            first_seen: Mutex::new(None),
        }
    }

    fn mark_written(&self, idx: usize) {
        self.valid[idx].store(true, Ordering::SeqCst);
        let mut first_seen = self.first_seen.lock().unwrap();
        if first_seen.is_none() {
            *first_seen = Some(SystemTime::now());
        }
    }

    pub fn first_seen(&self) -> Option<SystemTime> {
        *self.first_seen.lock().unwrap()
    }

    fn check_kind(&self, value: NumValue) {
        if value.kind() != self.kind {
            bug("metric value kind does not match the declared time-series kind");
        }
    }

    /// Native atomic add/store for integer kinds; a compare-and-swap loop
    /// over the bit pattern for floating point (spec.md §5, §9).
    pub fn add(&self, idx: usize, delta: NumValue) {
        self.check_kind(delta);
        match delta {
            NumValue::I64(d) => {
                self.slots[idx].fetch_add(d as u64, Ordering::SeqCst);
            }
            NumValue::U64(d) => {
                self.slots[idx].fetch_add(d, Ordering::SeqCst);
            }
            NumValue::F64(d) => loop {
                let cur_bits = self.slots[idx].load(Ordering::SeqCst);
                let new_bits = (f64::from_bits(cur_bits) + d).to_bits();
                if self.slots[idx].compare_exchange(cur_bits, new_bits, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
                    break;
                }
            },
        }
        self.mark_written(idx);
    }

    /// Counters only: `delta` must be non-negative (spec.md §4.10, §7).
    pub fn add_counter(&self, idx: usize, delta: NumValue) {
        let non_negative = match delta {
            NumValue::I64(d) => d >= 0,
            NumValue::U64(_) => true,
            NumValue::F64(d) => d >= 0.0,
        };
        if !non_negative {
            bug("counter delta must be non-negative");
        }
        self.add(idx, delta);
    }

    pub fn set(&self, idx: usize, value: NumValue) {
        self.check_kind(value);
        self.slots[idx].store(value.to_bits(), Ordering::SeqCst);
        self.mark_written(idx);
    }

    pub fn get(&self, idx: usize) -> Option<NumValue> {
        if !self.valid[idx].load(Ordering::SeqCst) {
            return None;
        }
        Some(NumValue::from_bits(self.kind, self.slots[idx].load(Ordering::SeqCst)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increment_is_monotonic() {
        let series = NumericSeries::new(NumKind::I64, 2);
        series.add_counter(0, NumValue::I64(1));
        series.add_counter(0, NumValue::I64(1));
        assert_eq!(series.get(0), Some(NumValue::I64(2)));
    }

    #[test]
    #[should_panic(expected = "programming error")]
    fn negative_counter_delta_is_a_bug() {
        let series = NumericSeries::new(NumKind::I64, 1);
        series.add_counter(0, NumValue::I64(-1));
    }

    #[test]
    fn gauge_set_then_add() {
        let series = NumericSeries::new(NumKind::F64, 1);
        series.set(0, NumValue::F64(10.0));
        series.add(0, NumValue::F64(-2.5));
        assert_eq!(series.get(0), Some(NumValue::F64(7.5)));
    }

    #[test]
    fn unwritten_slot_is_none() {
        let series = NumericSeries::new(NumKind::U64, 1);
        assert_eq!(series.get(0), None);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        use std::sync::Arc;
        let series = Arc::new(NumericSeries::new(NumKind::U64, 1));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let series = series.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..10_000 {
                    series.add_counter(0, NumValue::U64(1));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(series.get(0), Some(NumValue::U64(80_000)));
    }
}
