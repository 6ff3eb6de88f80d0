use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::timeseries::{CollectedSeries, TimeSeries};
use crate::value::NumKind;

/// A single registry key: metric name plus its fully-resolved label tuple,
/// sorted by label name so two callers building the same logical key in a
/// different field order still collide (spec.md §4.10 `getTS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    name: String,
    labels: Vec<(String, String)>,
}

impl Key {
    fn new(name: &str, mut labels: Vec<(String, String)>) -> Self {
        labels.sort();
        Key { name: name.to_string(), labels }
    }
}

/// The process-wide keyed concurrent map from `(metric name, label-tuple)`
/// to a time-series record (spec.md §4.10). Lookups and first-stores both
/// go through a single mutex guarding the map itself; per-series value
/// writes afterwards are lock-free (the series' own atomics), matching the
/// "map is concurrent-safe, per-time-series values use atomics" split
/// spec.md §9 calls out.
pub struct Registry {
    num_services: usize,
    series: Mutex<HashMap<Key, Arc<TimeSeries>>>,
}

impl Registry {
    pub fn new(num_services: usize) -> Self {
        Registry { series: Mutex::new(HashMap::new()), num_services }
    }

    pub fn num_services(&self) -> usize {
        self.num_services
    }

    /// Load-or-store a numeric time-series for `(name, labels)`. The map
    /// mutex is only held long enough to register the key; the caller that
    /// wins the insert then runs the actual storage setup under the
    /// series' own `InitGate`, so any value write on the returned handle
    /// is guaranteed to observe fully-initialized storage.
    pub fn get_or_create_numeric(&self, name: &str, labels: Vec<(String, String)>, kind: NumKind) -> Arc<TimeSeries> {
        let key = Key::new(name, labels.clone());
        let ts = {
            let mut map = self.series.lock().unwrap();
            map.entry(key).or_insert_with(|| Arc::new(TimeSeries::pending(name.to_string(), labels))).clone()
        };
        ts.ensure_numeric(kind, self.num_services);
        ts
    }

    pub fn get_or_create_histogram(&self, name: &str, labels: Vec<(String, String)>) -> Arc<TimeSeries> {
        let key = Key::new(name, labels.clone());
        let ts = {
            let mut map = self.series.lock().unwrap();
            map.entry(key).or_insert_with(|| Arc::new(TimeSeries::pending(name.to_string(), labels))).clone()
        };
        ts.ensure_histogram(self.num_services);
        ts
    }

    /// Snapshots every registered time-series (spec.md §4.10 `Collect()`).
    /// A series whose creator hasn't yet finished `ensure_numeric`/
    /// `ensure_histogram` is skipped for this pass rather than reported
    /// with no values under either kind.
    pub fn collect(&self) -> Vec<CollectedSeries> {
        let map = self.series.lock().unwrap();
        map.values()
            .filter(|ts| ts.is_initialized())
            .map(|ts| match ts.as_numeric() {
                Some(numeric) => CollectedSeries {
                    name: ts.name.clone(),
                    labels: ts.labels.clone(),
                    numeric_values: (0..numeric.len()).map(|i| numeric.get(i)).collect(),
                    histogram_values: Vec::new(),
                },
                None => CollectedSeries {
                    name: ts.name.clone(),
                    labels: ts.labels.clone(),
                    numeric_values: Vec::new(),
                    histogram_values: (0..self.num_services).map(|i| ts.as_histogram(i).map(|h| h.snapshot())).collect(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NumValue;

    #[test]
    fn get_or_create_is_idempotent_for_same_key() {
        let reg = Registry::new(1);
        let a = reg.get_or_create_numeric("requests_total", vec![("route".into(), "/x".into())], NumKind::U64);
        let b = reg.get_or_create_numeric("requests_total", vec![("route".into(), "/x".into())], NumKind::U64);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn label_order_does_not_change_identity() {
        let reg = Registry::new(1);
        let a = reg.get_or_create_numeric("x", vec![("a".into(), "1".into()), ("b".into(), "2".into())], NumKind::U64);
        let b = reg.get_or_create_numeric("x", vec![("b".into(), "2".into()), ("a".into(), "1".into())], NumKind::U64);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_labels_are_distinct_series() {
        let reg = Registry::new(1);
        let a = reg.get_or_create_numeric("x", vec![("route".into(), "/a".into())], NumKind::U64);
        let b = reg.get_or_create_numeric("x", vec![("route".into(), "/b".into())], NumKind::U64);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn collect_reports_written_values() {
        let reg = Registry::new(1);
        let ts = reg.get_or_create_numeric("hits", vec![], NumKind::U64);
        ts.as_numeric().unwrap().add_counter(0, NumValue::U64(3));
        let collected = reg.collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].numeric_values[0], Some(NumValue::U64(3)));
    }
}
