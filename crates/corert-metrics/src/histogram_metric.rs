use std::sync::Arc;

use crate::histogram::HistogramSnapshot;
use crate::labels::MetricLabels;
use crate::registry::Registry;
use crate::timeseries::TimeSeries;

/// A single unlabeled histogram time-series, one native histogram per
/// bundled service slot (spec.md §4.10 `Observe(value)`).
pub struct HistogramMetric {
    series: Arc<TimeSeries>,
}

impl HistogramMetric {
    pub fn new(registry: &Registry, name: &str) -> Self {
        HistogramMetric { series: registry.get_or_create_histogram(name, Vec::new()) }
    }

    pub fn observe(&self, idx: usize, value: f64) {
        self.series.as_histogram(idx).expect("histogram series must be a histogram").observe(value);
    }

    pub fn snapshot(&self, idx: usize) -> Option<HistogramSnapshot> {
        self.series.as_histogram(idx).map(|h| h.snapshot())
    }
}

/// A family of histograms keyed by a label value.
pub struct HistogramGroup<L: MetricLabels> {
    registry: Arc<Registry>,
    name: String,
    _marker: std::marker::PhantomData<L>,
}

impl<L: MetricLabels> HistogramGroup<L> {
    pub fn new(registry: Arc<Registry>, name: impl Into<String>) -> Self {
        HistogramGroup { registry, name: name.into(), _marker: std::marker::PhantomData }
    }

    pub fn observe(&self, labels: &L, idx: usize, value: f64) {
        let series = self.registry.get_or_create_histogram(&self.name, labels.label_tuple());
        series.as_histogram(idx).expect("histogram series must be a histogram").observe(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_then_snapshot() {
        let registry = Registry::new(1);
        let hist = HistogramMetric::new(&registry, "req_duration_seconds");
        hist.observe(0, 0.010);
        hist.observe(0, 0.012);
        let snap = hist.snapshot(0).unwrap();
        assert_eq!(snap.count, 2);
    }
}
