//! Uniform get/set of correlation metadata across a transport (spec.md
//! C8). HTTP headers are the only carrier implemented; other transports
//! plug in by implementing the same four operations.

use http::HeaderMap;

/// Keys with a canonical wire name, bypassing the vendor prefix (spec.md
/// §4.8).
const WELL_KNOWN: &[&str] = &["traceparent", "tracestate", "correlation-id"];

const VENDOR_PREFIX: &str = "x-encore-meta-";

fn wire_name(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    if WELL_KNOWN.contains(&lower.as_str()) {
        lower
    } else {
        format!("{VENDOR_PREFIX}{lower}")
    }
}

pub fn set_meta(headers: &mut HeaderMap, key: &str, value: &str) {
    if let (Ok(name), Ok(val)) = (http::HeaderName::from_bytes(wire_name(key).as_bytes()), http::HeaderValue::from_str(value)) {
        headers.insert(name, val);
    }
}

pub fn read_meta<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(wire_name(key))?.to_str().ok()
}

pub fn read_meta_values<'a>(headers: &'a HeaderMap, key: &str) -> Vec<&'a str> {
    headers
        .get_all(wire_name(key))
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect()
}

/// Sorted, deduplicated list of every metadata key present (their wire
/// names as received — callers strip [`VENDOR_PREFIX`] themselves if they
/// want original key names back).
pub fn list_meta_keys(headers: &HeaderMap) -> Vec<String> {
    let mut keys: Vec<String> = headers.keys().map(|k| k.as_str().to_string()).collect();
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_keys_use_canonical_wire_name() {
        let mut headers = HeaderMap::new();
        set_meta(&mut headers, "traceparent", "00-abc-def-01");
        assert!(headers.contains_key("traceparent"));
    }

    #[test]
    fn other_keys_get_vendor_prefix() {
        let mut headers = HeaderMap::new();
        set_meta(&mut headers, "user-id", "42");
        assert!(headers.contains_key("x-encore-meta-user-id"));
        assert_eq!(read_meta(&headers, "user-id"), Some("42"));
    }

    #[test]
    fn read_meta_values_collects_all_matches() {
        let mut headers = HeaderMap::new();
        headers.append("x-encore-meta-tag", http::HeaderValue::from_static("a"));
        headers.append("x-encore-meta-tag", http::HeaderValue::from_static("b"));
        assert_eq!(read_meta_values(&headers, "tag"), vec!["a", "b"]);
    }

    #[test]
    fn list_meta_keys_is_sorted_and_deduped() {
        let mut headers = HeaderMap::new();
        headers.append("b-header", http::HeaderValue::from_static("1"));
        headers.append("a-header", http::HeaderValue::from_static("2"));
        headers.append("a-header", http::HeaderValue::from_static("3"));
        assert_eq!(list_meta_keys(&headers), vec!["a-header".to_string(), "b-header".to_string()]);
    }
}
