use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::store::{navigate, Blobs, ExtractionGate};
use crate::test_scope::{TestHandle, TestTree};

/// Process-monotonic identifier for a [`Value`] (spec.md §4.11 item 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(u64);

static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

impl ValueId {
    fn next() -> Self {
        ValueId(NEXT_VALUE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// `(ValueID, path)` returned by [`ConfigStore::get_meta_for_value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMeta {
    pub id: ValueId,
    pub path: String,
}

/// Per-value override storage, keyed by the test handle that set it
/// (spec.md §4.11 item 4). Type-erased since [`ConfigStore`] hosts many
/// differently-typed [`Value`]s in one map.
struct OverrideMap {
    entries: Mutex<HashMap<(ValueId, TestHandle), Arc<dyn Any + Send + Sync>>>,
}

impl OverrideMap {
    fn new() -> Self {
        OverrideMap { entries: Mutex::new(HashMap::new()) }
    }

    fn set<T: Send + Sync + 'static>(&self, id: ValueId, handle: TestHandle, value: T) {
        self.entries.lock().unwrap().insert((id, handle), Arc::new(value));
    }

    /// Walks `lineage` (nearest test first) looking for the first override
    /// set for `id`; a child test with no override of its own inherits its
    /// parent's.
    fn resolve<T: Clone + Send + Sync + 'static>(&self, id: ValueId, lineage: &[TestHandle]) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        for handle in lineage {
            if let Some(value) = entries.get(&(id, *handle)) {
                return value.downcast_ref::<T>().cloned();
            }
        }
        None
    }
}

/// Owns the loaded per-service blobs, the `GetMetaForValue` extraction
/// gate, the test-override map, and the test scope tree (spec.md §4.11).
pub struct ConfigStore {
    blobs: Blobs,
    gate: ExtractionGate,
    overrides: OverrideMap,
    tests: TestTree,
}

impl ConfigStore {
    pub fn from_env(services: &[&str]) -> Arc<Self> {
        Arc::new(ConfigStore { blobs: Blobs::from_env(services), gate: ExtractionGate::new(), overrides: OverrideMap::new(), tests: TestTree::new() })
    }

    /// Test-only constructor with no environment dependency.
    pub fn empty() -> Arc<Self> {
        Arc::new(ConfigStore { blobs: Blobs::from_env(&[]), gate: ExtractionGate::new(), overrides: OverrideMap::new(), tests: TestTree::new() })
    }

    pub fn value<T>(self: &Arc<Self>, service: impl Into<String>, path: impl Into<String>, extractor: impl Fn(&serde_json::Value) -> T + Send + Sync + 'static) -> Value<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Value {
            id: ValueId::next(),
            service: service.into(),
            path: path.into(),
            extractor: Arc::new(extractor),
            store: self.clone(),
        }
    }

    /// `SetValueForTest` (spec.md §4.11 item 4): overrides `value` for the
    /// test currently on this thread (panics — via `ConfigStore::begin_test`
    /// contract — if called outside any test scope).
    pub fn set_value_for_test<T: Clone + Send + Sync + 'static>(&self, value: &Value<T>, new: T) {
        let handle = self.tests.current().unwrap_or_else(|| corert_common::bug("SetValueForTest called outside a test scope"));
        self.overrides.set(value.id, handle, new);
    }

    pub fn begin_test(&self) -> crate::test_scope::TestScopeGuard {
        self.tests.begin_test()
    }

    /// `GetMetaForValue` (spec.md §4.11 item 3).
    pub fn get_meta_for_value<T: Clone + Send + Sync + 'static>(&self, value: &Value<T>) -> ValueMeta {
        let (id, path) = self.gate.extract(|| {
            let _ = value.get();
        });
        ValueMeta { id: ValueId(id), path }
    }

    fn self_report(&self, id: ValueId, path: &str) {
        self.gate.self_report(id.0, path);
    }

    fn resolve_override<T: Clone + Send + Sync + 'static>(&self, id: ValueId) -> Option<T> {
        let current = self.tests.current()?;
        let lineage = self.tests.lineage(current);
        self.overrides.resolve(id, &lineage)
    }
}

/// An opaque function-like handle yielding a `T`, wired to a
/// `(service, path)` pair inside that service's configuration blob
/// (spec.md §4.11).
pub struct Value<T> {
    id: ValueId,
    service: String,
    path: String,
    extractor: Arc<dyn Fn(&serde_json::Value) -> T + Send + Sync>,
    store: Arc<ConfigStore>,
}

impl<T: Clone + Send + Sync + 'static> Value<T> {
    pub fn id(&self) -> ValueId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Evaluates the value: a per-test override if one is in scope,
    /// otherwise the value extracted from the service's configuration
    /// blob. Always self-reports to an in-flight `GetMetaForValue` first.
    pub fn get(&self) -> T {
        self.store.self_report(self.id, &self.path);
        if let Some(overridden) = self.store.resolve_override::<T>(self.id) {
            return overridden;
        }
        let blob = self.store.blobs.get(&self.service);
        let node = navigate(blob, &self.path).unwrap_or(&serde_json::Value::Null);
        (self.extractor)(node)
    }
}

impl<T> Clone for Value<T> {
    fn clone(&self) -> Self {
        Value { id: self.id, service: self.service.clone(), path: self.path.clone(), extractor: self.extractor.clone(), store: self.store.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_value(store: &Arc<ConfigStore>, path: &str) -> Value<String> {
        store.value("svc", path, |node| node.as_str().unwrap_or_default().to_string())
    }

    #[test]
    fn value_extracts_from_blob_path() {
        let store = ConfigStore::empty();
        // No env blob for "svc" → Null root, so the extractor sees Null and
        // yields the default empty string; override path is what we test.
        let value = string_value(&store, "greeting");
        assert_eq!(value.get(), "");
    }

    #[test]
    fn set_value_for_test_overrides_within_scope() {
        let store = ConfigStore::empty();
        let value = string_value(&store, "greeting");
        let _t = store.begin_test();
        store.set_value_for_test(&value, "hello".to_string());
        assert_eq!(value.get(), "hello");
    }

    #[test]
    fn override_does_not_leak_outside_its_test() {
        let store = ConfigStore::empty();
        let value = string_value(&store, "greeting");
        {
            let _t = store.begin_test();
            store.set_value_for_test(&value, "hello".to_string());
            assert_eq!(value.get(), "hello");
        }
        assert_eq!(value.get(), "");
    }

    #[test]
    fn child_test_inherits_parent_override() {
        let store = ConfigStore::empty();
        let value = string_value(&store, "greeting");
        let _parent = store.begin_test();
        store.set_value_for_test(&value, "from-parent".to_string());
        {
            let _child = store.begin_test();
            assert_eq!(value.get(), "from-parent");
        }
    }

    #[test]
    fn child_override_does_not_affect_parent() {
        let store = ConfigStore::empty();
        let value = string_value(&store, "greeting");
        let _parent = store.begin_test();
        store.set_value_for_test(&value, "from-parent".to_string());
        {
            let _child = store.begin_test();
            store.set_value_for_test(&value, "from-child".to_string());
            assert_eq!(value.get(), "from-child");
        }
        assert_eq!(value.get(), "from-parent");
    }

    #[test]
    fn get_meta_for_value_reports_id_and_path() {
        let store = ConfigStore::empty();
        let value = string_value(&store, "nested.greeting");
        let meta = store.get_meta_for_value(&value);
        assert_eq!(meta.id, value.id());
        assert_eq!(meta.path, "nested.greeting");
    }
}
