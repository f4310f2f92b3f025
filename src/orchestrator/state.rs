//! Shared process state handed to every axum handler, analogous to the
//! teacher's single wired-once collaborator bundle passed down from `main`.

use std::sync::Arc;

use crate::adapters::{Accounts, BlobStore, WebSearch};
use crate::auc::AucCache;
use crate::billing::BillingBatcher;
use crate::concurrency::ConcurrencyGovernor;
use crate::config::CoreConfig;
use crate::crawl::CrawlEngine;
use crate::events::CoreEventBus;
use crate::queue::JobQueue;
use crate::rate_limiter::RateLimiter;
use crate::worker::ScrapeWorker;
use crate::zdr::JobLogStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub auc: Arc<AucCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub governor: Arc<ConcurrencyGovernor>,
    pub queue: Arc<JobQueue>,
    pub worker: Arc<ScrapeWorker>,
    pub crawl_engine: Arc<CrawlEngine>,
    pub billing: Arc<BillingBatcher>,
    pub job_log: Arc<JobLogStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub accounts: Arc<dyn Accounts>,
    pub web_search: Arc<dyn WebSearch>,
    pub event_bus: Arc<CoreEventBus>,
}
