use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TeamId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CrawlState {
    Scraping,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlError {
    pub url: String,
    pub code: String,
    pub message: String,
}

/// Per-crawl options parsed from `POST /v<n>/crawl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrawlOptions {
    pub limit: Option<usize>,
    pub max_depth: Option<u32>,
    pub max_discovery_depth: Option<u32>,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub regex_on_full_url: bool,
    pub ignore_sitemap: bool,
    pub allow_backward_links: bool,
    pub crawl_entire_domain: bool,
    pub allow_subdomains: bool,
    pub delay_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub ignore_robots_txt: bool,
    pub zero_data_retention: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            limit: None,
            max_depth: None,
            max_discovery_depth: None,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            regex_on_full_url: false,
            ignore_sitemap: false,
            allow_backward_links: false,
            crawl_entire_domain: false,
            allow_subdomains: false,
            delay_ms: None,
            max_concurrency: None,
            ignore_robots_txt: false,
            zero_data_retention: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crawl {
    pub id: Uuid,
    pub team_id: TeamId,
    pub seed_url: String,
    pub options: CrawlOptions,
    pub created_at: DateTime<Utc>,
    pub state: CrawlState,
    pub discovered: HashSet<String>,
    pub completed: usize,
    pub failed: usize,
    pub errors: Vec<CrawlError>,
    pub robots_blocked: Vec<String>,
    pub zdr: bool,
    pub crawl_delay_secs: Option<f64>,
    pub seed_depth: usize,
    /// `min(userMaxConcurrency, teamConcurrencyMax)`, enforced by the
    /// Concurrency Governor when leasing slots for this crawl's children.
    pub concurrency_cap: usize,
}

impl Crawl {
    #[must_use]
    pub fn new(team_id: TeamId, seed_url: String, options: CrawlOptions, seed_depth: usize) -> Self {
        let zdr = options.zero_data_retention;
        Self {
            id: Uuid::new_v4(),
            team_id,
            seed_url,
            options,
            created_at: Utc::now(),
            state: CrawlState::Scraping,
            discovered: HashSet::new(),
            completed: 0,
            failed: 0,
            errors: Vec::new(),
            robots_blocked: Vec::new(),
            zdr,
            crawl_delay_secs: None,
            seed_depth,
            concurrency_cap: usize::MAX,
        }
    }

    /// Crawl completes when every admitted frontier URL has terminated and
    /// nothing remains in flight.
    #[must_use]
    pub fn is_complete(&self, inflight: usize, frontier_empty: bool) -> bool {
        self.state != CrawlState::Cancelled
            && inflight == 0
            && frontier_empty
            && self.completed + self.failed >= self.discovered.len()
    }

    #[must_use]
    pub fn effective_max_crawled_depth(&self, max_depth: u32) -> usize {
        self.seed_depth + max_depth as usize
    }
}
