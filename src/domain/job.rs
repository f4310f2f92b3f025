use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Credential, TeamId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobMode {
    Single,
    CrawlChild,
    BatchChild,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScrapeJobState {
    Queued,
    Active,
    Completed,
    Failed,
}

/// Options carried by a scrape job; this is the subset of the HTTP
/// `/v<n>/scrape` request body that survives into the queue and worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrapeJobOptions {
    pub formats: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub wait_for_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub max_age_ms: Option<u64>,
    pub store_in_cache: bool,
    pub mobile: bool,
    pub location_country: Option<String>,
    pub block_ads: bool,
    pub proxy: ProxyMode,
    pub has_actions: bool,
    pub json_schema: Option<serde_json::Value>,
    pub json_prompt: Option<String>,
    pub change_tracking_tag: Option<String>,
    pub zero_data_retention: bool,
    pub request_scoped_zdr: bool,
    pub use_mock: bool,
}

impl ScrapeJobOptions {
    #[must_use]
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms.unwrap_or(30_000))
    }

    #[must_use]
    pub fn max_age(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.max_age_ms.unwrap_or(4 * 60 * 60 * 1000))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProxyMode {
    #[default]
    Basic,
    Stealth,
    Auto,
}

impl std::fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProxyMode::Basic => "basic",
            ProxyMode::Stealth => "stealth",
            ProxyMode::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub team_id: TeamId,
    /// Credential the originating request authenticated with, carried
    /// through so the worker can attribute billing back to it at flush time.
    pub credential: Option<Credential>,
    pub url: String,
    pub options: ScrapeJobOptions,
    pub mode: JobMode,
    pub crawl_id: Option<Uuid>,
    pub attempts: u32,
    pub state: ScrapeJobState,
    pub created_at: DateTime<Utc>,
    pub zdr: bool,
    /// Per-team concurrency ceiling this job was admitted under — the
    /// caller's `Auc.concurrency_max` for directly-dispatched jobs, or the
    /// owning crawl's (narrower) `Crawl.concurrency_cap` for crawl/batch
    /// children. Carried on the job itself (rather than re-resolved at
    /// dequeue time) so the background worker pool, which only ever sees
    /// the dequeued `ScrapeJob`, can still enforce it.
    pub concurrency_cap: usize,
}

impl ScrapeJob {
    #[must_use]
    pub fn new(team_id: TeamId, url: String, options: ScrapeJobOptions, mode: JobMode) -> Self {
        let zdr = options.zero_data_retention;
        Self {
            id: Uuid::new_v4(),
            team_id,
            credential: None,
            url,
            options,
            mode,
            crawl_id: None,
            attempts: 0,
            state: ScrapeJobState::Queued,
            created_at: Utc::now(),
            zdr,
            concurrency_cap: usize::MAX,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn with_concurrency_cap(mut self, concurrency_cap: usize) -> Self {
        self.concurrency_cap = concurrency_cap;
        self
    }
}
