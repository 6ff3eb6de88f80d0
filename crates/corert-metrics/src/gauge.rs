use std::sync::Arc;

use crate::labels::MetricLabels;
use crate::registry::Registry;
use crate::timeseries::TimeSeries;
use crate::value::{NumKind, NumValue};

/// A single unlabeled gauge time-series (spec.md §4.10): `Set` and `Add`,
/// no non-negative restriction.
pub struct Gauge {
    series: Arc<TimeSeries>,
}

impl Gauge {
    pub fn new(registry: &Registry, name: &str) -> Self {
        Gauge { series: registry.get_or_create_numeric(name, Vec::new(), NumKind::F64) }
    }

    pub fn set(&self, idx: usize, value: f64) {
        self.series.as_numeric().expect("gauge series must be numeric").set(idx, NumValue::F64(value));
    }

    pub fn add(&self, idx: usize, delta: f64) {
        self.series.as_numeric().expect("gauge series must be numeric").add(idx, NumValue::F64(delta));
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        match self.series.as_numeric().expect("gauge series must be numeric").get(idx) {
            Some(NumValue::F64(v)) => Some(v),
            _ => None,
        }
    }
}

/// A family of gauges keyed by a label value.
pub struct GaugeGroup<L: MetricLabels> {
    registry: Arc<Registry>,
    name: String,
    _marker: std::marker::PhantomData<L>,
}

impl<L: MetricLabels> GaugeGroup<L> {
    pub fn new(registry: Arc<Registry>, name: impl Into<String>) -> Self {
        GaugeGroup { registry, name: name.into(), _marker: std::marker::PhantomData }
    }

    fn series_for(&self, labels: &L) -> Arc<TimeSeries> {
        self.registry.get_or_create_numeric(&self.name, labels.label_tuple(), NumKind::F64)
    }

    pub fn set(&self, labels: &L, idx: usize, value: f64) {
        self.series_for(labels).as_numeric().expect("gauge series must be numeric").set(idx, NumValue::F64(value));
    }

    pub fn add(&self, labels: &L, idx: usize, delta: f64) {
        self.series_for(labels).as_numeric().expect("gauge series must be numeric").add(idx, NumValue::F64(delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_set_then_add() {
        let registry = Registry::new(1);
        let gauge = Gauge::new(&registry, "queue_depth");
        gauge.set(0, 5.0);
        gauge.add(0, -2.0);
        assert_eq!(gauge.get(0), Some(3.0));
    }

    #[test]
    fn gauge_accepts_negative_delta_unlike_counter() {
        let registry = Registry::new(1);
        let gauge = Gauge::new(&registry, "temp");
        gauge.set(0, 0.0);
        gauge.add(0, -10.0);
        assert_eq!(gauge.get(0), Some(-10.0));
    }
}
