//! Counter/Gauge/Histogram time-series keyed by `(name, labels)`, with
//! per-service value slots (spec.md §4.10, Metrics Registry / C10).

mod counter;
mod gauge;
mod histogram;
mod histogram_metric;
mod init_gate;
mod labels;
mod registry;
mod timeseries;
mod value;

pub use counter::{Counter, CounterGroup};
pub use gauge::{Gauge, GaugeGroup};
pub use histogram::{Histogram, HistogramSnapshot, GROWTH};
pub use histogram_metric::{HistogramGroup, HistogramMetric};
pub use init_gate::InitGate;
pub use labels::MetricLabels;
pub use registry::Registry;
pub use timeseries::{CollectedSeries, Storage, TimeSeries};
pub use value::{NumKind, NumValue, NumericSeries};
