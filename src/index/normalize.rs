use url::Url;

const DEFAULT_INDEX_SUFFIXES: &[&str] = &[
    "index.html", "index.htm", "index.php", "index.shtml", "index.xml",
];

/// `urlKey = normalizeForIndex(url)`: lowercased host, `www.` stripped,
/// default ports removed, trailing `/` removed, known default index
/// suffixes stripped, fragment removed, scheme forced to `https`.
///
/// Idempotent: `normalize_for_index(normalize_for_index(u)) ==
/// normalize_for_index(u)` for every valid http(s) URL.
#[must_use]
pub fn normalize_for_index(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let is_default_port = matches!((parsed.scheme(), parsed.port()), ("http", Some(80)) | ("https", Some(443)));
    if is_default_port {
        let _ = parsed.set_port(None);
    }
    let _ = parsed.set_scheme("https");
    parsed.set_fragment(None);

    if let Some(host) = parsed.host_str() {
        let lower = host.to_lowercase();
        let stripped = lower.strip_prefix("www.").unwrap_or(&lower).to_string();
        let _ = parsed.set_host(Some(&stripped));
    }

    let mut path = parsed.path().to_string();
    for suffix in DEFAULT_INDEX_SUFFIXES {
        if let Some(stripped) = path.strip_suffix(suffix) {
            path = stripped.to_string();
            break;
        }
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path = "/".to_string();
    }
    parsed.set_path(&path);

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_trailing_slash() {
        assert_eq!(normalize_for_index("http://WWW.Example.com/foo/"), "https://example.com/foo");
    }

    #[test]
    fn strips_default_index_suffix() {
        assert_eq!(normalize_for_index("https://example.com/docs/index.html"), "https://example.com/docs");
    }

    #[test]
    fn drops_fragment_and_forces_https() {
        assert_eq!(normalize_for_index("http://example.com/a#section"), "https://example.com/a");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize_for_index("http://WWW.Example.com:80/foo/index.php#x");
        let twice = normalize_for_index(&once);
        assert_eq!(once, twice);
    }
}
