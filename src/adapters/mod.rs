//! Adapter traits for the external collaborators this crate treats as
//! pluggable: `Fetcher`, `Robots`, `Sitemap`, `Llm`, `BlobStore`, `Accounts`,
//! `Kv`. Production wiring supplies real implementations (an HTTP client, a
//! headless-browser microservice, an LLM SDK, object storage, a Postgres-
//! backed accounts service); [`mock`] provides deterministic in-memory
//! stand-ins used by this crate's own test suite.

pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Auc, Credential};
use crate::errors::FetchError;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub wait_for: Option<Duration>,
    pub proxy: crate::domain::ProxyMode,
    pub timeout: Duration,
    pub viewport: Option<(u32, u32)>,
    pub mobile: bool,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: String,
    pub final_url: String,
    pub proxy_used: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Name used for fallback-chain logging/tracing, e.g. "playwright",
    /// "plain-http", "pdf".
    fn name(&self) -> &str;

    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchResponse, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobotsDecision {
    Allowed,
    Denied,
}

#[async_trait]
pub trait Robots: Send + Sync {
    /// Returns the allow/deny decision and an optional `Crawl-delay` in
    /// seconds, resolved once per crawl and cached by the caller.
    async fn is_allowed(&self, url: &str, user_agent: &str) -> anyhow::Result<(RobotsDecision, Option<f64>)>;
}

#[async_trait]
pub trait Sitemap: Send + Sync {
    /// Returns every URL listed by the sitemap(s) discoverable from `url`.
    async fn list(&self, url: &str) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("llm extraction failed: {0}")]
pub struct LlmError(pub String);

#[async_trait]
pub trait Llm: Send + Sync {
    async fn extract(&self, schema_or_prompt: &str, content: &str) -> Result<Value, LlmError>;
    async fn summarize(&self, content: &str) -> Result<String, LlmError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, id: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
    async fn get(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn rpc_auth_chunk(&self, credential: &Credential, is_extract: bool) -> anyhow::Result<Option<Auc>>;
    async fn rpc_bill_team(
        &self,
        team: crate::domain::TeamId,
        subscription_id: Option<&str>,
        credits: f64,
        is_extract: bool,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Returns up to `limit` results for `query`, best-effort ordered by
    /// relevance.
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<WebSearchResult>>;
}

#[async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;
    async fn incr(&self, key: &str, by: i64, ttl: Option<Duration>) -> anyhow::Result<i64>;
    async fn zadd(&self, key: &str, member: &str, score: f64) -> anyhow::Result<()>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> anyhow::Result<Vec<String>>;
    async fn zrem(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn zcard(&self, key: &str) -> anyhow::Result<u64>;
    async fn lpush(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    async fn rpush(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    async fn lpop(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Acquire a distributed lock held for at most `ttl`; returns `true` if
    /// the lock was acquired.
    async fn lock(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;
    async fn unlock(&self, key: &str) -> anyhow::Result<()>;
}
