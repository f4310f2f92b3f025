//! Deterministic in-memory adapter implementations used by this crate's own
//! test suite. None of these are meant for production traffic.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::domain::{Auc, Credential, TeamId};
use crate::errors::FetchError;

use super::{
    Accounts, BlobStore, FetchOptions, FetchResponse, Fetcher, Kv, Llm, LlmError, Robots,
    RobotsDecision, Sitemap, WebSearch, WebSearchResult,
};

/// Fetcher that returns a canned response (or a scripted error) per URL,
/// letting worker/crawl-engine tests exercise fixed scenarios deterministically.
#[derive(Default)]
pub struct MockFetcher {
    responses: DashMap<String, Result<FetchResponse, FetchError>>,
    name: String,
    delay: Mutex<Duration>,
}

impl MockFetcher {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: DashMap::new(),
            name: name.into(),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn script(&self, url: impl Into<String>, response: Result<FetchResponse, FetchError>) {
        self.responses.insert(url.into(), response);
    }

    /// Makes every `fetch` call sleep before resolving, so tests can observe
    /// jobs held in flight (e.g. blocked on a concurrency cap).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, url: &str, _opts: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(url) {
            Some(entry) => entry.clone(),
            None => Ok(FetchResponse {
                status: 200,
                body: format!("<html><body>mock body for {url}</body></html>").into_bytes(),
                content_type: "text/html".to_string(),
                final_url: url.to_string(),
                proxy_used: "basic".to_string(),
            }),
        }
    }
}

/// Allows everything with no crawl-delay unless a URL was explicitly denied.
#[derive(Default)]
pub struct MockRobots {
    denied: DashMap<String, ()>,
    crawl_delay: Option<f64>,
}

impl MockRobots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, url: impl Into<String>) {
        self.denied.insert(url.into(), ());
    }
}

#[async_trait]
impl Robots for MockRobots {
    async fn is_allowed(&self, url: &str, _user_agent: &str) -> anyhow::Result<(RobotsDecision, Option<f64>)> {
        let decision = if self.denied.contains_key(url) {
            RobotsDecision::Denied
        } else {
            RobotsDecision::Allowed
        };
        Ok((decision, self.crawl_delay))
    }
}

#[derive(Default)]
pub struct MockSitemap {
    urls: Mutex<Vec<String>>,
}

impl MockSitemap {
    #[must_use]
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls: Mutex::new(urls),
        }
    }
}

#[async_trait]
impl Sitemap for MockSitemap {
    async fn list(&self, _url: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.urls.lock().clone())
    }
}

#[derive(Default)]
pub struct MockLlm;

#[async_trait]
impl Llm for MockLlm {
    async fn extract(&self, _schema_or_prompt: &str, _content: &str) -> Result<Value, LlmError> {
        Ok(json!({ "mock": true }))
    }

    async fn summarize(&self, content: &str) -> Result<String, LlmError> {
        Ok(content.chars().take(280).collect())
    }
}

#[derive(Default)]
pub struct MockBlobStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MockBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, id: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        self.objects.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.objects.get(id).map(|v| v.clone()))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.objects.remove(id);
        Ok(())
    }
}

/// In-memory Accounts store: every credential maps to a fixed team/AUC;
/// credits are mutated by `rpc_bill_team`.
pub struct MockAccounts {
    credential_to_team: DashMap<String, Auc>,
    billed: DashMap<(TeamId, bool), f64>,
}

impl Default for MockAccounts {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self {
            credential_to_team: DashMap::new(),
            billed: DashMap::new(),
        }
    }

    pub fn register(&self, credential: Credential, auc: Auc) {
        self.credential_to_team.insert(credential.0, auc);
    }

    #[must_use]
    pub fn total_billed(&self, team: TeamId, is_extract: bool) -> f64 {
        self.billed.get(&(team, is_extract)).map(|v| *v).unwrap_or(0.0)
    }
}

#[async_trait]
impl Accounts for MockAccounts {
    async fn rpc_auth_chunk(&self, credential: &Credential, is_extract: bool) -> anyhow::Result<Option<Auc>> {
        Ok(self.credential_to_team.get(&credential.0).map(|mut auc| {
            let mut auc = auc.value().clone();
            auc.is_extract = is_extract;
            auc
        }))
    }

    async fn rpc_bill_team(
        &self,
        team: TeamId,
        _subscription_id: Option<&str>,
        credits: f64,
        is_extract: bool,
    ) -> anyhow::Result<()> {
        *self.billed.entry((team, is_extract)).or_insert(0.0) += credits;
        for mut entry in self.credential_to_team.iter_mut() {
            if entry.value().team == team {
                entry.value_mut().credits_remaining -= credits;
            }
        }
        Ok(())
    }
}

struct ZEntry {
    score: f64,
}

/// `DashMap`-backed KV store standing in for the shared atomic
/// counter/sorted-set/list/lock store real deployments back with something
/// like Redis.
#[derive(Default)]
pub struct MockKv {
    strings: DashMap<String, (Vec<u8>, Option<Instant>)>,
    counters: DashMap<String, (i64, Option<Instant>)>,
    zsets: DashMap<String, BTreeMap<String, ZEntry>>,
    lists: DashMap<String, std::collections::VecDeque<Vec<u8>>>,
    locks: DashMap<String, Instant>,
}

impl MockKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expired(expiry: &Option<Instant>) -> bool {
        expiry.is_some_and(|e| Instant::now() >= e)
    }
}

#[async_trait]
impl Kv for MockKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        if let Some(entry) = self.strings.get(key) {
            if Self::expired(&entry.1) {
                drop(entry);
                self.strings.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.0.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> anyhow::Result<()> {
        let expiry = ttl.map(|d| Instant::now() + d);
        self.strings.insert(key.to_string(), (value, expiry));
        Ok(())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.strings.remove(key);
        self.counters.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64, ttl: Option<Duration>) -> anyhow::Result<i64> {
        let mut entry = self.counters.entry(key.to_string()).or_insert((0, None));
        if Self::expired(&entry.1) {
            entry.0 = 0;
        }
        entry.0 += by;
        if entry.1.is_none() {
            entry.1 = ttl.map(|d| Instant::now() + d);
        }
        Ok(entry.0)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> anyhow::Result<()> {
        self.zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), ZEntry { score });
        Ok(())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> anyhow::Result<Vec<String>> {
        Ok(self
            .zsets
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(_, e)| e.score >= min && e.score <= max)
                    .map(|(m, _)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zrem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        if let Some(mut set) = self.zsets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn zcard(&self, key: &str) -> anyhow::Result<u64> {
        Ok(self.zsets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn lpush(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        self.lists.entry(key.to_string()).or_default().push_front(value);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        self.lists.entry(key.to_string()).or_default().push_back(value);
        Ok(())
    }

    async fn lpop(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.lists.get_mut(key).and_then(|mut l| l.pop_front()))
    }

    async fn lock(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut acquired = false;
        self.locks
            .entry(key.to_string())
            .and_modify(|expiry| {
                if now >= *expiry {
                    *expiry = now + ttl;
                    acquired = true;
                }
            })
            .or_insert_with(|| {
                acquired = true;
                now + ttl
            });
        Ok(acquired)
    }

    async fn unlock(&self, key: &str) -> anyhow::Result<()> {
        self.locks.remove(key);
        Ok(())
    }
}

/// Canned web-search results keyed by query substring.
#[derive(Default)]
pub struct MockWebSearch {
    results: Mutex<Vec<WebSearchResult>>,
}

impl MockWebSearch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, results: Vec<WebSearchResult>) {
        *self.results.lock() = results;
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, _query: &str, limit: usize) -> anyhow::Result<Vec<WebSearchResult>> {
        Ok(self.results.lock().iter().take(limit).cloned().collect())
    }
}

/// Bundle of mock adapters convenient for constructing a fully wired
/// `CoreHandles` in tests.
pub struct MockAdapters {
    pub fetcher: Arc<MockFetcher>,
    pub robots: Arc<MockRobots>,
    pub sitemap: Arc<MockSitemap>,
    pub llm: Arc<MockLlm>,
    pub blob_store: Arc<MockBlobStore>,
    pub accounts: Arc<MockAccounts>,
    pub kv: Arc<MockKv>,
    pub web_search: Arc<MockWebSearch>,
}

impl Default for MockAdapters {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapters {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fetcher: Arc::new(MockFetcher::new("mock")),
            robots: Arc::new(MockRobots::new()),
            sitemap: Arc::new(MockSitemap::new(Vec::new())),
            llm: Arc::new(MockLlm),
            blob_store: Arc::new(MockBlobStore::new()),
            accounts: Arc::new(MockAccounts::new()),
            kv: Arc::new(MockKv::new()),
            web_search: Arc::new(MockWebSearch::new()),
        }
    }
}
