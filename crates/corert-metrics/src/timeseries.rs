use std::sync::OnceLock;

use crate::histogram::{Histogram, HistogramSnapshot};
use crate::init_gate::InitGate;
use crate::value::{NumKind, NumericSeries};

/// Either kind of payload a [`TimeSeries`] can hold.
pub enum Storage {
    Numeric(NumericSeries),
    Histogram(Vec<Histogram>),
}

/// `(metric name, label-tuple)` keyed record (spec.md §3
/// "MetricTimeSeries"). A brand-new key is registered as a thin, storage-less
/// record under the registry's map mutex ([`crate::Registry::get_or_create_numeric`]/
/// [`crate::Registry::get_or_create_histogram`]); the per-series value
/// storage is then built exactly once, under this series' own [`InitGate`],
/// entirely outside that map mutex — concurrent callers racing to create
/// the *same* new key block on the gate, not on the registry-wide lock, and
/// callers touching unrelated keys are never blocked by one key's setup.
/// Every value read/write after that first store is lock-free, through
/// `storage`'s own atomics.
pub struct TimeSeries {
    pub name: String,
    pub labels: Vec<(String, String)>,
    gate: InitGate,
    storage: OnceLock<Storage>,
}

impl TimeSeries {
    pub fn pending(name: String, labels: Vec<(String, String)>) -> Self {
        TimeSeries { name, labels, gate: InitGate::new(), storage: OnceLock::new() }
    }

    /// Builds the numeric storage for this series if no caller has yet;
    /// concurrent callers for the same series block here until the winner
    /// finishes.
    pub fn ensure_numeric(&self, kind: NumKind, num_services: usize) {
        self.gate.ready_or_init(|| {
            let _ = self.storage.set(Storage::Numeric(NumericSeries::new(kind, num_services)));
        });
    }

    /// Builds the histogram storage for this series if no caller has yet;
    /// concurrent callers for the same series block here until the winner
    /// finishes.
    pub fn ensure_histogram(&self, num_services: usize) {
        self.gate.ready_or_init(|| {
            let _ = self.storage.set(Storage::Histogram((0..num_services).map(|_| Histogram::new()).collect()));
        });
    }

    /// `false` for the narrow window between a brand-new key's registration
    /// in the map and its creator finishing [`Self::ensure_numeric`]/
    /// [`Self::ensure_histogram`]; [`crate::Registry::collect`] skips such
    /// a series rather than report it with no values under either kind.
    pub fn is_initialized(&self) -> bool {
        self.storage.get().is_some()
    }

    pub fn as_numeric(&self) -> Option<&NumericSeries> {
        match self.storage.get()? {
            Storage::Numeric(n) => Some(n),
            Storage::Histogram(_) => None,
        }
    }

    pub fn as_histogram(&self, idx: usize) -> Option<&Histogram> {
        match self.storage.get()? {
            Storage::Histogram(h) => h.get(idx),
            Storage::Numeric(_) => None,
        }
    }
}

/// One row of [`crate::Registry::collect`]'s flat snapshot.
pub struct CollectedSeries {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub numeric_values: Vec<Option<crate::value::NumValue>>,
    pub histogram_values: Vec<Option<HistogramSnapshot>>,
}
