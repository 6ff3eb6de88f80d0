//! CORS origin matching (spec.md §6, supplemented per SPEC_FULL.md §3).
//!
//! Exact match against a sorted list via binary search falls back to a
//! glob match on `scheme://host[:port]`, where `*` in the host component
//! matches any run of non-separator characters; ports default to 80
//! (`http`) / 443 (`https`) when absent from the origin being tested.

/// A parsed `scheme://host[:port]` origin, ready for glob comparison.
struct Origin<'a> {
    scheme: &'a str,
    host: &'a str,
    port: u16,
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" => 443,
        _ => 80,
    }
}

fn parse_origin(origin: &str) -> Option<Origin<'_>> {
    let (scheme, rest) = origin.split_once("://")?;
    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => (h, p.parse().ok()?),
        _ => (rest, default_port(scheme)),
    };
    Some(Origin { scheme, host, port })
}

/// Shell-style glob match (`*` = any run of non-`/` characters — origins
/// never contain `/`, so this is equivalent to "any run of characters").
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => (0..=t.len()).any(|i| helper(&p[1..], &t[i..])),
            Some(&c) => t.first() == Some(&c) && helper(&p[1..], &t[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

/// Exact match against `sorted_list` (binary search — the list must
/// already be sorted), falling back to glob matching `origin`'s
/// `scheme://host:port` against each entry in `globs`.
pub fn origin_matches(origin: &str, sorted_list: &[String], globs: &[String]) -> bool {
    if sorted_list.binary_search_by(|s| s.as_str().cmp(origin)).is_ok() {
        return true;
    }
    let Some(parsed) = parse_origin(origin) else {
        return false;
    };
    globs.iter().any(|pattern| match_glob_origin(pattern, &parsed))
}

fn match_glob_origin(pattern: &str, origin: &Origin<'_>) -> bool {
    let Some(parsed_pattern) = parse_origin(pattern) else {
        return false;
    };
    parsed_pattern.scheme == origin.scheme
        && parsed_pattern.port == origin.port
        && glob_match(parsed_pattern.host, origin.host)
}

/// `accepted-with-credentials` per spec.md §8's CORS law.
pub fn accepted_with_credentials(
    origin: &str,
    credentials_list: &[String],
    credentials_globs: &[String],
    unsafe_allow_all: bool,
) -> bool {
    unsafe_allow_all || origin_matches(origin, credentials_list, credentials_globs)
}

/// `accepted-without-credentials`: the wildcard `*` in the without-creds
/// list means "all".
pub fn accepted_without_credentials(origin: &str, without_creds_list: &[String]) -> bool {
    without_creds_list.iter().any(|s| s == "*") || without_creds_list.iter().any(|s| s == origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<&str>) -> Vec<String> {
        v.sort();
        v.into_iter().map(String::from).collect()
    }

    #[test]
    fn exact_match_in_sorted_list() {
        let list = sorted(vec!["https://a.example.com", "https://b.example.com"]);
        assert!(origin_matches("https://b.example.com", &list, &[]));
    }

    #[test]
    fn glob_matches_subdomain_wildcard() {
        let globs = vec!["https://*.example.com".to_string()];
        assert!(origin_matches("https://foo.example.com", &[], &globs));
        assert!(!origin_matches("https://foo.example.org", &[], &globs));
    }

    #[test]
    fn default_ports_applied_when_absent() {
        let globs = vec!["http://*.example.com:80".to_string()];
        assert!(origin_matches("http://foo.example.com", &[], &globs));
    }

    #[test]
    fn without_credentials_wildcard_accepts_all() {
        assert!(accepted_without_credentials("https://anything.test", &["*".to_string()]));
    }

    #[test]
    fn with_credentials_unsafe_wildcard_overrides_list() {
        assert!(accepted_with_credentials("https://anywhere.test", &[], &[], true));
    }

    #[test]
    fn with_credentials_false_without_match() {
        assert!(!accepted_with_credentials("https://evil.test", &[], &[], false));
    }
}
