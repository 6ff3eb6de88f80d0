/// Implemented by a "comparable struct of string fields" usable as a
/// metric's label value (spec.md §4.10 `CounterGroup[L,V]`). Group metrics
/// map an instance of `Self` through [`MetricLabels::label_tuple`] to
/// produce the registry key's label portion.
pub trait MetricLabels {
    fn label_tuple(&self) -> Vec<(String, String)>;
}

impl MetricLabels for () {
    fn label_tuple(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
