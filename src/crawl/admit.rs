//! The pure `admit(url)` predicate a candidate URL must pass before it is
//! added to a crawl's frontier. Deliberately free of any adapter call except
//! the robots decision, which the caller resolves and passes in, so the
//! seven checks are unit-testable without a network.

use regex::Regex;
use url::Url;

use crate::domain::CrawlOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    Admit,
    RejectNotAbsoluteHttp,
    RejectDepth,
    RejectScope,
    RejectPattern,
    RejectRobots,
    RejectDuplicate,
    RejectDiscoveryDepth,
}

pub struct AdmitContext<'a> {
    pub seed_url: &'a Url,
    pub seed_depth: usize,
    pub options: &'a CrawlOptions,
    pub discovered: &'a std::collections::HashSet<String>,
    pub is_sitemap_url: bool,
    pub introduced_depth: usize,
}

/// Path-segment count, used both for the seed's own depth and a candidate's
/// depth relative to it.
#[must_use]
pub fn path_depth(url: &Url) -> usize {
    url.path_segments().map(|s| s.filter(|seg| !seg.is_empty()).count()).unwrap_or(0)
}

/// Registrable-domain-equal host check without a full public-suffix-list
/// dependency: compares the last two labels of each host. Close enough for
/// the common `sub.example.com` vs `example.com` case this crate targets;
/// multi-part public suffixes (e.g. `co.uk`) are a known limitation.
#[must_use]
fn registrable_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

#[must_use]
pub fn admit(
    candidate: &str,
    normalized: &str,
    ctx: &AdmitContext<'_>,
    robots_denied: bool,
    include_re: &[Regex],
    exclude_re: &[Regex],
) -> AdmitDecision {
    // 1. Normalize; reject if not absolute http(s).
    let Ok(parsed) = Url::parse(candidate) else {
        return AdmitDecision::RejectNotAbsoluteHttp;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return AdmitDecision::RejectNotAbsoluteHttp;
    }

    // 2. Depth.
    if let Some(max_depth) = ctx.options.max_depth {
        let max_crawled_depth = ctx.seed_depth + max_depth as usize;
        if path_depth(&parsed) > max_crawled_depth {
            return AdmitDecision::RejectDepth;
        }
    }

    // 3. Scope.
    let crawl_entire_domain = ctx.options.crawl_entire_domain;
    let allow_backward_links = ctx.options.allow_backward_links;
    if !crawl_entire_domain && !allow_backward_links {
        let seed_path = ctx.seed_url.path();
        if !parsed.path().starts_with(seed_path) {
            return AdmitDecision::RejectScope;
        }
    }
    let seed_host = ctx.seed_url.host_str().unwrap_or_default();
    let candidate_host = parsed.host_str().unwrap_or_default();
    let host_ok = if ctx.options.allow_subdomains {
        registrable_domain(seed_host) == registrable_domain(candidate_host)
    } else {
        seed_host == candidate_host
    };
    if !host_ok {
        return AdmitDecision::RejectScope;
    }

    // 4. Include/exclude path filters.
    let match_target = if ctx.options.regex_on_full_url {
        parsed.as_str()
    } else {
        parsed.path()
    };
    if !include_re.is_empty() && !include_re.iter().any(|re| re.is_match(match_target)) {
        return AdmitDecision::RejectPattern;
    }
    if exclude_re.iter().any(|re| re.is_match(match_target)) {
        return AdmitDecision::RejectPattern;
    }

    // 5. Robots.
    if !ctx.options.ignore_robots_txt && robots_denied {
        return AdmitDecision::RejectRobots;
    }

    // 6. Dedup.
    if ctx.discovered.contains(normalized) {
        return AdmitDecision::RejectDuplicate;
    }

    // 7. Max discovery depth (link-extraction-origin URLs only).
    if let Some(max_discovery_depth) = ctx.options.max_discovery_depth {
        if !ctx.is_sitemap_url && ctx.introduced_depth > max_discovery_depth as usize {
            return AdmitDecision::RejectDiscoveryDepth;
        }
    }

    AdmitDecision::Admit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ctx<'a>(seed: &'a Url, options: &'a CrawlOptions, discovered: &'a HashSet<String>) -> AdmitContext<'a> {
        AdmitContext {
            seed_url: seed,
            seed_depth: path_depth(seed),
            options,
            discovered,
            is_sitemap_url: false,
            introduced_depth: 1,
        }
    }

    #[test]
    fn depth_zero_admits_only_seed_depth() {
        let seed = Url::parse("https://example.com/blog").unwrap();
        let mut options = CrawlOptions::default();
        options.max_depth = Some(0);
        options.crawl_entire_domain = true;
        let discovered = HashSet::new();
        let c = ctx(&seed, &options, &discovered);

        let decision = admit(
            "https://example.com/blog/post-1",
            "https://example.com/blog/post-1",
            &c,
            false,
            &[],
            &[],
        );
        assert_eq!(decision, AdmitDecision::RejectDepth);
    }

    #[test]
    fn scope_rejects_other_domain_without_subdomains() {
        let seed = Url::parse("https://example.com/").unwrap();
        let options = CrawlOptions::default();
        let discovered = HashSet::new();
        let c = ctx(&seed, &options, &discovered);

        let decision = admit("https://other.com/x", "https://other.com/x", &c, false, &[], &[]);
        assert_eq!(decision, AdmitDecision::RejectScope);
    }

    #[test]
    fn crawl_entire_domain_overrides_backward_link_restriction() {
        let seed = Url::parse("https://example.com/blog/").unwrap();
        let mut options = CrawlOptions::default();
        options.crawl_entire_domain = true;
        options.allow_backward_links = false;
        let discovered = HashSet::new();
        let c = ctx(&seed, &options, &discovered);

        let decision = admit("https://example.com/pricing", "https://example.com/pricing", &c, false, &[], &[]);
        assert_eq!(decision, AdmitDecision::Admit);
    }

    #[test]
    fn dedup_rejects_already_discovered() {
        let seed = Url::parse("https://example.com/").unwrap();
        let mut options = CrawlOptions::default();
        options.crawl_entire_domain = true;
        let mut discovered = HashSet::new();
        discovered.insert("https://example.com/a".to_string());
        let c = ctx(&seed, &options, &discovered);

        let decision = admit("https://example.com/a", "https://example.com/a", &c, false, &[], &[]);
        assert_eq!(decision, AdmitDecision::RejectDuplicate);
    }
}
