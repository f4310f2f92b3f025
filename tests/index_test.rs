use std::time::Duration;

use scrapeforge_core::domain::{CacheState, Document, DocumentFormats, DocumentMetadata};
use scrapeforge_core::index::{fingerprint, normalize_for_index, FingerprintInput, Lookup, ResultIndex};
use uuid::Uuid;

fn sample_document(url: &str) -> Document {
    Document {
        scrape_id: Uuid::new_v4(),
        source_url: url.to_string(),
        normalized_url: normalize_for_index(url),
        final_url: url.to_string(),
        status_code: 200,
        formats: DocumentFormats {
            markdown: Some("# hello".to_string()),
            ..Default::default()
        },
        metadata: DocumentMetadata {
            proxy_used: "basic".to_string(),
            cache_state: CacheState::Miss,
            cached_at: None,
            scrape_id: Uuid::new_v4(),
            source_url: url.to_string(),
        },
        error: None,
    }
}

fn plain_fingerprint() -> FingerprintInput<'static> {
    FingerprintInput {
        formats: &[],
        headers: &[],
        mobile: false,
        location_country: None,
        block_ads: false,
        proxy: scrapeforge_core::domain::ProxyMode::Basic,
        has_actions: false,
    }
}

#[test]
fn normalize_strips_www_default_port_and_trailing_slash() {
    assert_eq!(normalize_for_index("http://WWW.Example.com:80/path/"), "https://example.com/path");
}

#[test]
fn normalize_is_idempotent() {
    let once = normalize_for_index("https://example.com/a/index.html");
    let twice = normalize_for_index(&once);
    assert_eq!(once, twice);
}

#[tokio::test]
async fn store_then_lookup_is_a_cache_hit() {
    let index = ResultIndex::open("sqlite::memory:").await.unwrap();
    let url_key = normalize_for_index("https://example.com/a");
    let fp = fingerprint(&plain_fingerprint());
    let doc = sample_document("https://example.com/a");

    index.store(&url_key, &fp, &doc, None).await.unwrap();

    match index.lookup(&url_key, &fp, None).await.unwrap() {
        Lookup::Hit(found) => assert_eq!(found.formats.markdown, doc.formats.markdown),
        Lookup::Miss => panic!("expected a cache hit after store"),
    }
}

#[tokio::test]
async fn zero_max_age_forces_a_miss() {
    let index = ResultIndex::open("sqlite::memory:").await.unwrap();
    let url_key = normalize_for_index("https://example.com/b");
    let fp = fingerprint(&plain_fingerprint());
    index.store(&url_key, &fp, &sample_document("https://example.com/b"), None).await.unwrap();

    let lookup = index.lookup(&url_key, &fp, Some(Duration::ZERO)).await.unwrap();
    assert_eq!(lookup, Lookup::Miss);
}

#[tokio::test]
async fn differing_fingerprints_do_not_collide() {
    let index = ResultIndex::open("sqlite::memory:").await.unwrap();
    let url_key = normalize_for_index("https://example.com/c");
    let markdown_fp = fingerprint(&FingerprintInput {
        formats: &["markdown".to_string()],
        ..plain_fingerprint()
    });
    let json_fp = fingerprint(&FingerprintInput {
        formats: &["json".to_string()],
        ..plain_fingerprint()
    });
    assert_ne!(markdown_fp, json_fp);

    index.store(&url_key, &markdown_fp, &sample_document("https://example.com/c"), None).await.unwrap();
    assert_eq!(index.lookup(&url_key, &json_fp, None).await.unwrap(), Lookup::Miss);
}
