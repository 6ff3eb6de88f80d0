use std::collections::HashMap;
use std::sync::Mutex;

/// Geometric bucket growth factor (spec.md §4.10, §9): bucket `i`'s upper
/// bound is `base * GROWTH^i`.
pub const GROWTH: f64 = 1.1;

#[derive(Default)]
struct State {
    sum: f64,
    count: u64,
    zero_count: u64,
    positive_buckets: HashMap<i32, u64>,
    negative_buckets: HashMap<i32, u64>,
}

/// An exponentially-bucketed native histogram (spec.md §4.10). Bucket
/// assignment is sparse (a `HashMap<bucket index, count>`), matching the
/// "only allocate buckets you actually observe into" shape of real native
/// histogram implementations rather than a dense fixed-size array.
pub struct Histogram {
    state: Mutex<State>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Histogram { state: Mutex::new(State::default()) }
    }

    fn bucket_index(v: f64) -> i32 {
        (v.abs().ln() / GROWTH.ln()).floor() as i32
    }

    pub fn observe(&self, value: f64) {
        let mut state = self.state.lock().unwrap();
        state.sum += value;
        state.count += 1;
        if value == 0.0 {
            state.zero_count += 1;
        } else if value > 0.0 {
            *state.positive_buckets.entry(Self::bucket_index(value)).or_insert(0) += 1;
        } else {
            *state.negative_buckets.entry(Self::bucket_index(value)).or_insert(0) += 1;
        }
    }

    pub fn sum(&self) -> f64 {
        self.state.lock().unwrap().sum
    }

    pub fn count(&self) -> u64 {
        self.state.lock().unwrap().count
    }

    /// Snapshot of `(bucket index, count)` pairs, positive buckets first,
    /// zero bucket, then negative buckets — the shape `Collect()` reports.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let state = self.state.lock().unwrap();
        let mut positive: Vec<(i32, u64)> = state.positive_buckets.iter().map(|(k, v)| (*k, *v)).collect();
        positive.sort_by_key(|(k, _)| *k);
        let mut negative: Vec<(i32, u64)> = state.negative_buckets.iter().map(|(k, v)| (*k, *v)).collect();
        negative.sort_by_key(|(k, _)| *k);
        HistogramSnapshot {
            sum: state.sum,
            count: state.count,
            zero_count: state.zero_count,
            positive_buckets: positive,
            negative_buckets: negative,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub sum: f64,
    pub count: u64,
    pub zero_count: u64,
    pub positive_buckets: Vec<(i32, u64)>,
    pub negative_buckets: Vec<(i32, u64)>,
}
