use std::collections::HashMap;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Per-service configuration blobs, read once at process start from
/// `ENCORE_CFG_<UPPER-SERVICE>` (spec.md §4.11, §6): a base64url-encoded
/// JSON document per service.
pub struct Blobs {
    by_service: HashMap<String, serde_json::Value>,
}

impl Blobs {
    /// Reads `ENCORE_CFG_<UPPER(service)>` for each name in `services`.
    /// A missing or malformed variable yields `serde_json::Value::Null`
    /// for that service rather than failing process start — `Value::get`
    /// surfaces the absence as a missing path, not a crash at boot.
    pub fn from_env(services: &[&str]) -> Self {
        let mut by_service = HashMap::new();
        for service in services {
            let var = format!("ENCORE_CFG_{}", service.to_uppercase());
            let blob = std::env::var(&var).ok().and_then(|encoded| decode_blob(&var, &encoded)).unwrap_or(serde_json::Value::Null);
            by_service.insert((*service).to_string(), blob);
        }
        Blobs { by_service }
    }

    pub fn get(&self, service: &str) -> &serde_json::Value {
        static NULL: serde_json::Value = serde_json::Value::Null;
        self.by_service.get(service).unwrap_or(&NULL)
    }
}

fn decode_blob(var: &str, encoded: &str) -> Option<serde_json::Value> {
    let decoded = match URL_SAFE_NO_PAD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(var, %err, "failed to base64url-decode configuration blob");
            return None;
        }
    };
    match serde_json::from_slice(&decoded) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(var, %err, "failed to parse configuration blob as JSON");
            None
        }
    }
}

/// Looks up a dot-separated path (`"a.b.c"`) inside a JSON document.
pub fn navigate<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut cur = root;
    if path.is_empty() {
        return Some(cur);
    }
    for segment in path.split('.') {
        cur = cur.as_object()?.get(segment)?;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_walks_dotted_path() {
        let doc: serde_json::Value = serde_json::json!({"a": {"b": {"c": 42}}});
        assert_eq!(navigate(&doc, "a.b.c"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn navigate_missing_path_is_none() {
        let doc: serde_json::Value = serde_json::json!({"a": 1});
        assert_eq!(navigate(&doc, "a.b"), None);
    }

    #[test]
    fn navigate_empty_path_returns_root() {
        let doc: serde_json::Value = serde_json::json!({"a": 1});
        assert_eq!(navigate(&doc, ""), Some(&doc));
    }

    #[test]
    fn missing_env_var_yields_null_blob() {
        let blobs = Blobs::from_env(&["definitely-not-set-service"]);
        assert_eq!(blobs.get("definitely-not-set-service"), &serde_json::Value::Null);
    }
}

/// Guards `GetMetaForValue`'s brief re-entry into "extraction mode"
/// (spec.md §4.11 item 3): a single process-wide slot, since only one
/// `GetMetaForValue` call is meant to be in flight under the mutex at a
/// time.
pub struct ExtractionGate {
    state: Mutex<ExtractionState>,
}

struct ExtractionState {
    active: bool,
    report: Option<(u64, String)>,
}

impl Default for ExtractionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionGate {
    pub fn new() -> Self {
        ExtractionGate { state: Mutex::new(ExtractionState { active: false, report: None }) }
    }

    /// Runs `invoke` with extraction mode active and returns the single
    /// self-report it produced. More than zero or more than one reports
    /// is a programming error (spec.md §4.11 item 3).
    pub fn extract(&self, invoke: impl FnOnce()) -> (u64, String) {
        {
            let mut state = self.state.lock().unwrap();
            state.active = true;
            state.report = None;
        }
        invoke();
        let mut state = self.state.lock().unwrap();
        state.active = false;
        match state.report.take() {
            Some(report) => report,
            None => corert_common::bug("Value did not self-report during GetMetaForValue"),
        }
    }

    /// Called by every `Value::get()`. No-op unless extraction mode is
    /// currently active for this gate.
    pub fn self_report(&self, id: u64, path: &str) {
        let mut state = self.state.lock().unwrap();
        if state.active {
            if state.report.is_some() {
                corert_common::bug("Value self-reported more than once during GetMetaForValue");
            }
            state.report = Some((id, path.to_string()));
        }
    }
}

#[cfg(test)]
mod gate_tests {
    use super::*;

    #[test]
    fn extract_returns_the_single_self_report() {
        let gate = ExtractionGate::new();
        let (id, path) = gate.extract(|| gate.self_report(7, "foo.bar"));
        assert_eq!(id, 7);
        assert_eq!(path, "foo.bar");
    }

    #[test]
    #[should_panic(expected = "programming error")]
    fn extract_with_no_report_is_a_bug() {
        let gate = ExtractionGate::new();
        gate.extract(|| {});
    }

    #[test]
    #[should_panic(expected = "programming error")]
    fn double_self_report_is_a_bug() {
        let gate = ExtractionGate::new();
        gate.extract(|| {
            gate.self_report(1, "a");
            gate.self_report(2, "b");
        });
    }

    #[test]
    fn self_report_outside_extraction_is_ignored() {
        let gate = ExtractionGate::new();
        gate.self_report(1, "a");
    }
}
