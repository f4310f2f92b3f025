//! Core configuration types.
//!
//! `CoreConfig` holds every tunable the spec names as a default: credit
//! costs, rate-limit fallbacks, concurrency/queue/cache defaults, billing
//! batch sizing, and deployment flags. Construct via [`CoreConfig::builder`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-operation credit costs (§4.6 "Credit costs (default)").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditCosts {
    /// `markdown`/`rawHtml`/`links`/`screenshot(@fullPage)` scrape: 1 credit per URL.
    pub per_page: f64,
    /// Multiplier applied when `json`/`extract`/`summary` is requested.
    pub llm_format_multiplier: f64,
    pub map_call: f64,
    pub search_per_document: f64,
}

impl Default for CreditCosts {
    fn default() -> Self {
        Self {
            per_page: 1.0,
            llm_format_multiplier: 5.0,
            map_call: 1.0,
            search_per_document: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Connection string for the SQLite-backed durable stores (Result
    /// Index, Job Queue, crawl records, billing ledger).
    pub(crate) database_url: String,

    pub(crate) credit_costs: CreditCosts,

    /// How long a positive AUC cache entry is trusted before a refresh is
    /// forced on next use.
    pub(crate) auc_cache_ttl: Duration,
    /// Optional short negative-cache TTL, used to throttle bad-token floods.
    pub(crate) auc_negative_cache_ttl: Option<Duration>,
    pub(crate) auc_resolve_retries: u32,
    pub(crate) auc_resolve_backoff: Duration,

    /// Sliding-window size for the rate limiter. Spec fixes this at 60s.
    pub(crate) rate_limit_window: Duration,

    /// Default index freshness window applied when a scrape omits `maxAge`.
    pub(crate) default_max_age: Duration,

    /// Job Queue priority-band weights, in `(realtime, crawl, background)`
    /// order, used for weighted round-robin dequeue.
    pub(crate) queue_band_weights: (u32, u32, u32),
    pub(crate) queue_lease_duration: Duration,
    pub(crate) job_max_retries: u32,

    pub(crate) billing_batch_size: usize,
    pub(crate) billing_flush_interval: Duration,
    pub(crate) billing_lock_ttl: Duration,

    /// ZDR cleaner sweep cadence and lookback bound (7 days per spec).
    pub(crate) zdr_sweep_interval: Duration,
    pub(crate) zdr_lookback: Duration,

    /// When set, `resolve()` returns a synthetic unlimited AUC instead of
    /// calling the Accounts adapter. Mirrors a deployment flag, not a
    /// per-request option.
    pub(crate) db_auth_bypass: bool,
    /// Credential string treated as the designated preview credential.
    pub(crate) preview_credential: Option<String>,

    pub(crate) user_agent: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://scrapeforge.sqlite".to_string(),
            credit_costs: CreditCosts::default(),
            auc_cache_ttl: Duration::from_secs(10 * 60),
            auc_negative_cache_ttl: Some(Duration::from_secs(5)),
            auc_resolve_retries: 5,
            auc_resolve_backoff: Duration::from_millis(200),
            rate_limit_window: Duration::from_secs(60),
            default_max_age: Duration::from_secs(4 * 60 * 60),
            queue_band_weights: (4, 2, 1),
            queue_lease_duration: Duration::from_secs(60),
            job_max_retries: 3,
            billing_batch_size: 100,
            billing_flush_interval: Duration::from_secs(15),
            billing_lock_ttl: Duration::from_secs(30),
            zdr_sweep_interval: Duration::from_secs(300),
            zdr_lookback: Duration::from_secs(7 * 24 * 60 * 60),
            db_auth_bypass: false,
            preview_credential: None,
            user_agent: "scrapeforge/0.1".to_string(),
        }
    }
}

impl CoreConfig {
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    #[must_use]
    pub fn credit_costs(&self) -> &CreditCosts {
        &self.credit_costs
    }

    #[must_use]
    pub fn auc_cache_ttl(&self) -> Duration {
        self.auc_cache_ttl
    }

    #[must_use]
    pub fn auc_negative_cache_ttl(&self) -> Option<Duration> {
        self.auc_negative_cache_ttl
    }

    #[must_use]
    pub fn auc_resolve_retries(&self) -> u32 {
        self.auc_resolve_retries
    }

    #[must_use]
    pub fn auc_resolve_backoff(&self) -> Duration {
        self.auc_resolve_backoff
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn default_max_age(&self) -> Duration {
        self.default_max_age
    }

    #[must_use]
    pub fn queue_band_weights(&self) -> (u32, u32, u32) {
        self.queue_band_weights
    }

    #[must_use]
    pub fn queue_lease_duration(&self) -> Duration {
        self.queue_lease_duration
    }

    #[must_use]
    pub fn job_max_retries(&self) -> u32 {
        self.job_max_retries
    }

    #[must_use]
    pub fn billing_batch_size(&self) -> usize {
        self.billing_batch_size
    }

    #[must_use]
    pub fn billing_flush_interval(&self) -> Duration {
        self.billing_flush_interval
    }

    #[must_use]
    pub fn billing_lock_ttl(&self) -> Duration {
        self.billing_lock_ttl
    }

    #[must_use]
    pub fn zdr_sweep_interval(&self) -> Duration {
        self.zdr_sweep_interval
    }

    #[must_use]
    pub fn zdr_lookback(&self) -> Duration {
        self.zdr_lookback
    }

    #[must_use]
    pub fn db_auth_bypass(&self) -> bool {
        self.db_auth_bypass
    }

    #[must_use]
    pub fn preview_credential(&self) -> Option<&str> {
        self.preview_credential.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
