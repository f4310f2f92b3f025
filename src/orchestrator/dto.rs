//! Request/response wire shapes for the HTTP surface. Kept separate from
//! the domain types so a body-schema change never ripples into the queue,
//! index, or worker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Document, ProxyMode, ScrapeJobOptions};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOptions {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonOptions {
    pub schema: Option<serde_json::Value>,
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeTrackingOptions {
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub wait_for: Option<u64>,
    pub timeout: Option<u64>,
    pub max_age: Option<u64>,
    #[serde(default = "default_true")]
    pub store_in_cache: bool,
    #[serde(default)]
    pub mobile: bool,
    pub location: Option<LocationOptions>,
    #[serde(default)]
    pub block_ads: bool,
    pub proxy: Option<String>,
    #[serde(default)]
    pub actions: Option<serde_json::Value>,
    pub json_options: Option<JsonOptions>,
    pub extract: Option<JsonOptions>,
    pub change_tracking_options: Option<ChangeTrackingOptions>,
    #[serde(default)]
    pub zero_data_retention: bool,
    #[serde(default)]
    pub use_mock: bool,
}

impl ScrapeRequest {
    /// Lowers the wire shape into the options the worker and job queue carry.
    /// `zeroDataRetention` is the HTTP surface's only ZDR lever, so it drives
    /// both the job-level redaction flag and the request-scoped 404 behavior.
    pub fn into_job_options(self) -> ScrapeJobOptions {
        let proxy = match self.proxy.as_deref() {
            Some("stealth") => ProxyMode::Stealth,
            Some("auto") => ProxyMode::Auto,
            _ => ProxyMode::Basic,
        };
        let (json_schema, json_prompt) = self
            .json_options
            .or(self.extract)
            .map(|j| (j.schema, j.prompt))
            .unwrap_or((None, None));

        ScrapeJobOptions {
            formats: if self.formats.is_empty() {
                vec!["markdown".to_string()]
            } else {
                self.formats
            },
            headers: self.headers.into_iter().collect(),
            wait_for_ms: self.wait_for,
            timeout_ms: self.timeout,
            max_age_ms: self.max_age,
            store_in_cache: self.store_in_cache,
            mobile: self.mobile,
            location_country: self.location.and_then(|l| l.country),
            block_ads: self.block_ads,
            proxy,
            has_actions: self.actions.is_some(),
            json_schema,
            json_prompt,
            change_tracking_tag: self.change_tracking_options.and_then(|c| c.tag),
            zero_data_retention: self.zero_data_retention,
            request_scoped_zdr: self.zero_data_retention,
            use_mock: self.use_mock,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    pub url: String,
    pub limit: Option<usize>,
    pub max_depth: Option<u32>,
    pub max_discovery_depth: Option<u32>,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub regex_on_full_url: bool,
    #[serde(default)]
    pub ignore_sitemap: bool,
    #[serde(default)]
    pub allow_backward_links: bool,
    #[serde(default)]
    pub crawl_entire_domain: bool,
    #[serde(default)]
    pub allow_subdomains: bool,
    pub delay: Option<u64>,
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub ignore_robots_txt: bool,
    pub scrape_options: Option<ScrapeOptionsSubset>,
    #[serde(default)]
    pub zero_data_retention: bool,
}

/// `scrapeOptions` embedded in crawl/batch/search requests: every
/// `ScrapeRequest` field except `url`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptionsSubset {
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub wait_for: Option<u64>,
    pub timeout: Option<u64>,
    pub max_age: Option<u64>,
    #[serde(default = "default_true")]
    pub store_in_cache: bool,
    #[serde(default)]
    pub mobile: bool,
    pub location: Option<LocationOptions>,
    #[serde(default)]
    pub block_ads: bool,
    pub proxy: Option<String>,
}

impl ScrapeOptionsSubset {
    pub fn into_job_options(self) -> ScrapeJobOptions {
        let proxy = match self.proxy.as_deref() {
            Some("stealth") => ProxyMode::Stealth,
            Some("auto") => ProxyMode::Auto,
            _ => ProxyMode::Basic,
        };
        ScrapeJobOptions {
            formats: if self.formats.is_empty() {
                vec!["markdown".to_string()]
            } else {
                self.formats
            },
            headers: self.headers.into_iter().collect(),
            wait_for_ms: self.wait_for,
            timeout_ms: self.timeout,
            max_age_ms: self.max_age,
            store_in_cache: self.store_in_cache,
            mobile: self.mobile,
            location_country: self.location.and_then(|l| l.country),
            block_ads: self.block_ads,
            proxy,
            ..ScrapeJobOptions::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStartResponse {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatusWire {
    Scraping,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct CrawlStatusResponse {
    pub status: CrawlStatusWire,
    pub completed: usize,
    pub total: usize,
    pub data: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct CrawlErrorWire {
    pub url: String,
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CrawlErrorsResponse {
    pub errors: Vec<CrawlErrorWire>,
    #[serde(rename = "robotsBlocked")]
    pub robots_blocked: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OngoingCrawlWire {
    pub id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct OngoingCrawlsResponse {
    pub crawls: Vec<OngoingCrawlWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScrapeRequest {
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub scrape_options: ScrapeOptionsSubset,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    pub url: String,
    pub search: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub ignore_sitemap: bool,
    #[serde(default)]
    pub include_subdomains: bool,
}

#[derive(Debug, Serialize)]
pub struct WebResultWire {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct MapMetadata {
    pub total_count: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub success: bool,
    pub web: Vec<WebResultWire>,
    pub links: Vec<String>,
    pub metadata: MapMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    #[serde(default)]
    pub scrape_options: ScrapeOptionsSubset,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub data: Vec<Document>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub urls: Vec<String>,
    pub schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CreditUsageResponse {
    pub remaining_credits: f64,
}

#[derive(Debug, Serialize)]
pub struct TokenUsageResponse {
    pub remaining_tokens: f64,
}

#[derive(Debug, Serialize)]
pub struct ConcurrencyCheckResponse {
    pub concurrency: usize,
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: usize,
}
