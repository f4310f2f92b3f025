//! Orchestrator binary: wires every collaborator, spawns the background
//! tasks (AUC sweep, billing flush, ZDR sweep, worker pool), and serves the
//! HTTP surface. Adapters are the in-memory mocks until a real Fetcher/Llm/
//! Accounts backend is wired in (see DESIGN.md).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use scrapeforge_core::adapters::mock::MockAdapters;
use scrapeforge_core::adapters::Fetcher;
use scrapeforge_core::auc::AucCache;
use scrapeforge_core::billing::BillingBatcher;
use scrapeforge_core::concurrency::ConcurrencyGovernor;
use scrapeforge_core::config::CoreConfig;
use scrapeforge_core::crawl::CrawlEngine;
use scrapeforge_core::events::CoreEventBus;
use scrapeforge_core::index::ResultIndex;
use scrapeforge_core::orchestrator::{build_router, AppState};
use scrapeforge_core::queue::JobQueue;
use scrapeforge_core::rate_limiter::RateLimiter;
use scrapeforge_core::worker::{EventBusObserver, ScrapeWorker};
use scrapeforge_core::zdr::{JobLogStore, ZdrCleaner};

const WORKER_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(CoreConfig::builder().database_url("sqlite://scrapeforge.sqlite").build());

    let index = Arc::new(ResultIndex::open(config.database_url()).await?);
    let queue = Arc::new(
        JobQueue::open(
            config.database_url(),
            config.queue_lease_duration(),
            config.job_max_retries(),
            config.queue_band_weights(),
        )
        .await?,
    );
    let job_log = Arc::new(JobLogStore::open(config.database_url()).await?);

    let adapters = MockAdapters::new();
    let event_bus = Arc::new(CoreEventBus::new(1024));

    let auc = Arc::new(AucCache::new(
        adapters.accounts.clone(),
        config.auc_cache_ttl(),
        config.auc_negative_cache_ttl(),
        config.auc_resolve_retries(),
        config.auc_resolve_backoff(),
        config.db_auth_bypass(),
        config.preview_credential().map(str::to_string),
    ));
    auc.spawn_cleanup_task();

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

    let _worker_pool = scrapeforge_core::worker::pool::spawn_worker_pool(
        WORKER_CONCURRENCY,
        queue.clone(),
        worker.clone(),
        crawl_engine.clone(),
    );

    let _zdr_sweeper = ZdrCleaner::spawn(
        job_log.clone(),
        adapters.blob_store.clone(),
        Some(event_bus.clone()),
        config.zdr_sweep_interval(),
        config.zdr_lookback(),
    );

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

    let router = build_router(state);

    let addr: SocketAddr = std::env::var("SCRAPEFORGE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "scrapeforge orchestrator listening");

    axum::serve(listener, router).await?;
    Ok(())
}
