//! Auth/Usage Chunk cache: resolves a credential to team identity, plan,
//! rate-limit profile, and live credit balance, cached briefly to keep the
//! Accounts adapter off the hot path.
//!
//! Structure (TTL entry + idle/LRU eviction + background sweep + double
//! checked locking on miss) is the same shape as the teacher's
//! search-engine-instance cache, keyed here by `(credential, isExtract)`
//! instead of a filesystem path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::interval;
use uuid::Uuid;

use crate::adapters::Accounts;
use crate::domain::{Auc, Credential, TeamId};
use crate::errors::CoreError;

const MAX_ENTRIES: usize = 10_000;

struct Entry {
    auc: Option<Auc>,
    stored_at: Instant,
    ttl: Duration,
    last_accessed_nanos: Arc<AtomicU64>,
}

fn instant_to_nanos(base: Instant, t: Instant) -> u64 {
    t.saturating_duration_since(base).as_nanos() as u64
}

/// `(credential, isExtract)` cache key.
type Key = (String, bool);

pub struct AucCache {
    accounts: Arc<dyn Accounts>,
    entries: Arc<Mutex<HashMap<Key, Entry>>>,
    base_time: Instant,
    positive_ttl: Duration,
    negative_ttl: Option<Duration>,
    resolve_retries: u32,
    resolve_backoff: Duration,
    db_auth_bypass: bool,
    preview_credential: Option<String>,
}

impl AucCache {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn Accounts>,
        positive_ttl: Duration,
        negative_ttl: Option<Duration>,
        resolve_retries: u32,
        resolve_backoff: Duration,
        db_auth_bypass: bool,
        preview_credential: Option<String>,
    ) -> Self {
        Self {
            accounts,
            entries: Arc::new(Mutex::new(HashMap::new())),
            base_time: Instant::now(),
            positive_ttl,
            negative_ttl,
            resolve_retries,
            resolve_backoff,
            db_auth_bypass,
            preview_credential,
        }
    }

    /// `resolve(credential, op) -> AUC | Unauthorized | Invalid`
    pub async fn resolve(&self, credential: &Credential, op: &str) -> Result<Auc, CoreError> {
        if !credential.is_well_formed() {
            return Err(CoreError::Validation("credential is not well-formed".to_string()));
        }

        let is_extract = is_extract_op(op);

        if self.db_auth_bypass {
            return Ok(Auc::bypass(TeamId(Uuid::nil())));
        }

        if let Some(preview) = &self.preview_credential {
            if &credential.0 == preview {
                return Ok(Auc::preview(TeamId(Uuid::nil())));
            }
        }

        let key: Key = (credential.0.clone(), is_extract);

        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if entry.stored_at.elapsed() <= entry.ttl {
                    entry
                        .last_accessed_nanos
                        .store(instant_to_nanos(self.base_time, Instant::now()), Ordering::Relaxed);
                    return match &entry.auc {
                        Some(auc) => Ok(auc.clone()),
                        None => Err(CoreError::Auth),
                    };
                }
            }
            if entries.len() >= MAX_ENTRIES {
                evict_lru(&mut entries, self.base_time);
            }
        }

        let resolved = self.fetch_with_retry(credential, is_extract).await?;

        let mut entries = self.entries.lock().await;
        let ttl = match &resolved {
            Some(_) => self.positive_ttl,
            None => self.negative_ttl.unwrap_or(Duration::ZERO),
        };
        entries.insert(
            key,
            Entry {
                auc: resolved.clone(),
                stored_at: Instant::now(),
                ttl,
                last_accessed_nanos: Arc::new(AtomicU64::new(instant_to_nanos(self.base_time, Instant::now()))),
            },
        );

        resolved.ok_or(CoreError::Auth)
    }

    async fn fetch_with_retry(&self, credential: &Credential, is_extract: bool) -> Result<Option<Auc>, CoreError> {
        let mut last_err = None;
        for attempt in 0..self.resolve_retries {
            match self.accounts.rpc_auth_chunk(credential, is_extract).await {
                Ok(auc) => return Ok(auc),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < self.resolve_retries {
                        tokio::time::sleep(self.resolve_backoff).await;
                    }
                }
            }
        }
        Err(CoreError::Other(last_err.unwrap_or_else(|| anyhow::anyhow!("AUC resolve exhausted retries"))))
    }

    /// Invalidate both `(credential, isExtract=false)` and `(credential,
    /// isExtract=true)` variants, e.g. on a credit/plan mutation.
    pub async fn invalidate(&self, credential: &Credential) {
        let mut entries = self.entries.lock().await;
        entries.remove(&(credential.0.clone(), false));
        entries.remove(&(credential.0.clone(), true));
    }

    /// Optimistic decrement used by the billing batcher after a successful
    /// flush, without waiting for the next Accounts round trip.
    pub async fn decrement_credits(&self, credential: &Credential, credits: f64) {
        let mut entries = self.entries.lock().await;
        for is_extract in [false, true] {
            if let Some(entry) = entries.get_mut(&(credential.0.clone(), is_extract)) {
                if let Some(auc) = entry.auc.as_mut() {
                    auc.credits_remaining -= credits;
                }
            }
        }
    }

    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(60));
            loop {
                ticker.tick().await;
                this.sweep_expired().await;
            }
        })
    }

    async fn sweep_expired(&self) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.stored_at.elapsed() <= e.ttl);
    }

    pub async fn cache_size(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn evict_lru(entries: &mut HashMap<Key, Entry>, base_time: Instant) {
    if let Some((oldest_key, _)) = entries
        .iter()
        .min_by_key(|(_, e)| e.last_accessed_nanos.load(Ordering::Relaxed))
        .map(|(k, e)| (k.clone(), instant_to_nanos(base_time, e.stored_at)))
    {
        entries.remove(&oldest_key);
    }
}

fn is_extract_op(op: &str) -> bool {
    matches!(op, "extract" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockAccounts;

    fn cred() -> Credential {
        Credential(Uuid::new_v4().to_string())
    }

    #[tokio::test]
    async fn rejects_malformed_credential() {
        let accounts: Arc<dyn Accounts> = Arc::new(MockAccounts::new());
        let cache = AucCache::new(accounts, Duration::from_secs(600), None, 1, Duration::from_millis(1), false, None);
        let err = cache.resolve(&Credential("not-a-uuid".to_string()), "scrape").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_credential_is_unauthorized() {
        let accounts: Arc<dyn Accounts> = Arc::new(MockAccounts::new());
        let cache = AucCache::new(accounts, Duration::from_secs(600), None, 1, Duration::from_millis(1), false, None);
        let err = cache.resolve(&cred(), "scrape").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth));
    }

    #[tokio::test]
    async fn caches_positive_result() {
        let mock = Arc::new(MockAccounts::new());
        let credential = cred();
        let team = TeamId(Uuid::new_v4());
        mock.register(
            credential.clone(),
            Auc {
                team,
                plan: "pro".to_string(),
                rate_limits: crate::domain::RateLimitTable(HashMap::new()),
                concurrency_max: 10,
                credits_remaining: 100.0,
                flags: Default::default(),
                is_extract: false,
            },
        );
        let accounts: Arc<dyn Accounts> = mock;
        let cache = AucCache::new(accounts, Duration::from_secs(600), None, 1, Duration::from_millis(1), false, None);
        let auc = cache.resolve(&credential, "scrape").await.unwrap();
        assert_eq!(auc.team, team);
        assert_eq!(cache.cache_size().await, 1);
    }

    #[tokio::test]
    async fn bypass_mode_returns_unlimited() {
        let accounts: Arc<dyn Accounts> = Arc::new(MockAccounts::new());
        let cache = AucCache::new(accounts, Duration::from_secs(600), None, 1, Duration::from_millis(1), true, None);
        let auc = cache.resolve(&cred(), "scrape").await.unwrap();
        assert_eq!(auc.plan, "bypass");
    }
}
