use xxhash_rust::xxh3::xxh3_64;

use crate::domain::ProxyMode;

/// Canonicalized subset of scrape options that affects output equivalence,
/// per §4.4's fingerprint rules. `changeTracking` is deliberately excluded
/// so a plain request can reuse a cache entry stored by a changeTracking
/// request and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintInput<'a> {
    pub formats: &'a [String],
    pub headers: &'a [(String, String)],
    pub mobile: bool,
    pub location_country: Option<&'a str>,
    pub block_ads: bool,
    pub proxy: ProxyMode,
    pub has_actions: bool,
}

/// `proxy:auto` that resolved to `basic` is indexed as `basic`, so a later
/// plain `proxy:basic` request can satisfy against it; callers pass the
/// *resolved* proxy mode, not the requested one.
#[must_use]
pub fn fingerprint(input: &FingerprintInput<'_>) -> String {
    let mut formats: Vec<&str> = input.formats.iter().map(String::as_str).collect();
    formats.sort_unstable();

    let mut headers: Vec<(&str, &str)> = input
        .headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    headers.sort_unstable();

    let canonical = format!(
        "formats={:?}|headers={:?}|mobile={}|country={:?}|blockAds={}|proxy={}|actions={}",
        formats,
        headers,
        input.mobile,
        input.location_country,
        input.block_ads,
        resolved_proxy_label(input.proxy),
        input.has_actions,
    );

    format!("{:016x}", xxh3_64(canonical.as_bytes()))
}

fn resolved_proxy_label(proxy: ProxyMode) -> &'static str {
    match proxy {
        ProxyMode::Basic | ProxyMode::Auto => "basic",
        ProxyMode::Stealth => "stealth",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> FingerprintInput<'static> {
        FingerprintInput {
            formats: &[],
            headers: &[],
            mobile: false,
            location_country: None,
            block_ads: false,
            proxy: ProxyMode::Basic,
            has_actions: false,
        }
    }

    #[test]
    fn differs_on_headers() {
        let a = base();
        let mut b = base();
        let headers = vec![("X-Test".to_string(), "1".to_string())];
        b.headers = &headers;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn auto_and_basic_proxy_collide() {
        let mut a = base();
        a.proxy = ProxyMode::Auto;
        let mut b = base();
        b.proxy = ProxyMode::Basic;
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn screenshot_variants_are_distinct() {
        let fmt_plain = vec!["screenshot".to_string()];
        let fmt_full = vec!["screenshot@fullPage".to_string()];
        let mut a = base();
        a.formats = &fmt_plain;
        let mut b = base();
        b.formats = &fmt_full;
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
