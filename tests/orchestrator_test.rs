use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use scrapeforge_core::adapters::mock::MockAdapters;
use scrapeforge_core::adapters::Fetcher;
use scrapeforge_core::auc::AucCache;
use scrapeforge_core::billing::BillingBatcher;
use scrapeforge_core::concurrency::ConcurrencyGovernor;
use scrapeforge_core::config::CoreConfig;
use scrapeforge_core::crawl::CrawlEngine;
use scrapeforge_core::domain::{Auc, Credential, TeamId};
use scrapeforge_core::events::CoreEventBus;
use scrapeforge_core::index::ResultIndex;
use scrapeforge_core::orchestrator::{build_router, AppState};
use scrapeforge_core::queue::JobQueue;
use scrapeforge_core::rate_limiter::RateLimiter;
use scrapeforge_core::worker::{EventBusObserver, ScrapeWorker};
use scrapeforge_core::zdr::JobLogStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn test_state() -> (AppState, Credential) {
    let config = Arc::new(CoreConfig::builder().database_url("sqlite::memory:").build());
    let index = Arc::new(ResultIndex::open(config.database_url()).await.unwrap());
    let queue = Arc::new(
        JobQueue::open(config.database_url(), config.queue_lease_duration(), config.job_max_retries(), config.queue_band_weights())
            .await
            .unwrap(),
    );
    let job_log = Arc::new(JobLogStore::open(config.database_url()).await.unwrap());

    let adapters = MockAdapters::new();
    let event_bus = Arc::new(CoreEventBus::new(1024));

    let team = TeamId(Uuid::new_v4());
    let credential = Credential(Uuid::new_v4().to_string());
    adapters.accounts.register(
        credential.clone(),
        Auc {
            team,
            plan: "growth".to_string(),
            rate_limits: scrapeforge_core::domain::RateLimitTable(std::collections::HashMap::new()),
            concurrency_max: 10,
            credits_remaining: 1000.0,
            flags: Default::default(),
            is_extract: false,
        },
    );

    let auc = Arc::new(AucCache::new(
        adapters.accounts.clone(),
        config.auc_cache_ttl(),
        config.auc_negative_cache_ttl(),
        config.auc_resolve_retries(),
        config.auc_resolve_backoff(),
        config.db_auth_bypass(),
        config.preview_credential().map(str::to_string),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_window()));
    let governor = Arc::new(ConcurrencyGovernor::new());
    let billing = BillingBatcher::spawn(
        adapters.accounts.clone(),
        adapters.kv.clone(),
        Some(auc.clone()),
        Some(event_bus.clone()),
        config.billing_batch_size(),
        config.billing_flush_interval(),
        config.billing_lock_ttl(),
    );
    let crawl_engine = Arc::new(CrawlEngine::new(
        queue.clone(),
        adapters.robots.clone(),
        adapters.sitemap.clone(),
        Some(event_bus.clone()),
        config.user_agent().to_string(),
    ));
    let fetcher_chain: Vec<Arc<dyn Fetcher>> = vec![adapters.fetcher.clone()];
    let worker = Arc::new(ScrapeWorker::new(
        fetcher_chain,
        adapters.llm.clone(),
        adapters.blob_store.clone(),
        adapters.accounts.clone(),
        index,
        governor.clone(),
        billing.clone(),
        Arc::new(EventBusObserver(event_bus.clone())),
        config.credit_costs().clone(),
        job_log.clone(),
        config.zdr_lookback(),
    ));

    let state = AppState {
        config: config.clone(),
        auc,
        rate_limiter,
        governor,
        queue,
        worker,
        crawl_engine,
        billing,
        job_log,
        blob_store: adapters.blob_store.clone(),
        accounts: adapters.accounts.clone(),
        web_search: adapters.web_search.clone(),
        event_bus,
    };

    (state, credential)
}

#[tokio::test]
async fn health_check_is_unauthenticated() {
    let (state, _credential) = test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn scrape_without_bearer_token_is_rejected() {
    let (state, _credential) = test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/scrape")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "url": "https://example.com" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scrape_with_valid_bearer_returns_a_document() {
    let (state, credential) = test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/scrape")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", credential.0))
                .body(Body::from(json!({ "url": "https://example.com", "formats": ["markdown"] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["success"], json!(true));
    assert!(parsed["data"]["formats"]["markdown"].is_string());
}

#[tokio::test]
async fn scrape_with_malformed_url_is_rejected_as_validation_error() {
    let (state, credential) = test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/scrape")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", credential.0))
                .body(Body::from(json!({ "url": "not-a-url" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_scrape_id_returns_not_found() {
    let (state, credential) = test_state().await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/v1/scrape/{}", Uuid::new_v4()))
                .header("authorization", format!("Bearer {}", credential.0))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
