use std::sync::Arc;

use crate::labels::MetricLabels;
use crate::registry::Registry;
use crate::timeseries::TimeSeries;
use crate::value::{NumKind, NumValue};

/// A single unlabeled counter time-series (spec.md §4.10). `idx` selects
/// which bundled service's slot to write — resolving which service is
/// "current" is the embedder's job, not this crate's.
pub struct Counter {
    series: Arc<TimeSeries>,
}

impl Counter {
    pub fn new(registry: &Registry, name: &str) -> Self {
        Counter { series: registry.get_or_create_numeric(name, Vec::new(), NumKind::U64) }
    }

    pub fn increment(&self, idx: usize) {
        self.series.as_numeric().expect("counter series must be numeric").add_counter(idx, NumValue::U64(1));
    }

    pub fn add(&self, idx: usize, delta: u64) {
        self.series.as_numeric().expect("counter series must be numeric").add_counter(idx, NumValue::U64(delta));
    }

    pub fn get(&self, idx: usize) -> Option<u64> {
        match self.series.as_numeric().expect("counter series must be numeric").get(idx) {
            Some(NumValue::U64(v)) => Some(v),
            _ => None,
        }
    }
}

/// A family of counters keyed by a label value (spec.md §4.10
/// `CounterGroup[L,V]`). Each distinct `labels.label_tuple()` result maps
/// to its own time-series in the shared registry.
pub struct CounterGroup<L: MetricLabels> {
    registry: Arc<Registry>,
    name: String,
    _marker: std::marker::PhantomData<L>,
}

impl<L: MetricLabels> CounterGroup<L> {
    pub fn new(registry: Arc<Registry>, name: impl Into<String>) -> Self {
        CounterGroup { registry, name: name.into(), _marker: std::marker::PhantomData }
    }

    fn series_for(&self, labels: &L) -> Arc<TimeSeries> {
        self.registry.get_or_create_numeric(&self.name, labels.label_tuple(), NumKind::U64)
    }

    pub fn increment(&self, labels: &L, idx: usize) {
        self.series_for(labels).as_numeric().expect("counter series must be numeric").add_counter(idx, NumValue::U64(1));
    }

    pub fn add(&self, labels: &L, idx: usize, delta: u64) {
        self.series_for(labels).as_numeric().expect("counter series must be numeric").add_counter(idx, NumValue::U64(delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Route(String);
    impl MetricLabels for Route {
        fn label_tuple(&self) -> Vec<(String, String)> {
            vec![("route".to_string(), self.0.clone())]
        }
    }

    #[test]
    fn plain_counter_increments() {
        let registry = Registry::new(1);
        let counter = Counter::new(&registry, "hits_total");
        counter.increment(0);
        counter.increment(0);
        assert_eq!(counter.get(0), Some(2));
    }

    #[test]
    fn group_counter_splits_by_label() {
        let registry = Arc::new(Registry::new(1));
        let group: CounterGroup<Route> = CounterGroup::new(registry.clone(), "route_hits");
        group.increment(&Route("/a".into()), 0);
        group.increment(&Route("/a".into()), 0);
        group.increment(&Route("/b".into()), 0);
        let collected = registry.collect();
        assert_eq!(collected.len(), 2);
    }
}
