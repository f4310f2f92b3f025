use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::domain::Document;

use super::CacheEntry;
use super::Lookup;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS index_entries (
    url_key TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    document_json TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    ttl_hint_secs INTEGER,
    PRIMARY KEY (url_key, fingerprint)
);
CREATE INDEX IF NOT EXISTS idx_index_entries_url_key ON index_entries(url_key);
"#;

const PATH_CACHE_SIZE: usize = 2000;

/// SQLite-backed `(urlKey, fingerprint) -> document` store with WAL
/// journaling and an in-process LRU read-through cache, mirroring the
/// teacher's link index persistence pattern.
pub struct ResultIndex {
    pool: SqlitePool,
    read_cache: Arc<Mutex<LruCache<(String, String), CacheEntry>>>,
}

impl ResultIndex {
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(StdDuration::from_secs(30));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            read_cache: Arc::new(Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(PATH_CACHE_SIZE).expect("nonzero"),
            ))),
        })
    }

    /// `lookup(url, options) -> Document | miss`. `max_age` of `None` means
    /// "no freshness bound" (any stored entry satisfies); `Some(Duration::ZERO)`
    /// forces a miss.
    pub async fn lookup(&self, url_key: &str, fingerprint: &str, max_age: Option<StdDuration>) -> anyhow::Result<Lookup> {
        if max_age == Some(StdDuration::ZERO) {
            return Ok(Lookup::Miss);
        }

        let key = (url_key.to_string(), fingerprint.to_string());
        if let Some(entry) = self.read_cache.lock().get(&key).cloned() {
            return Ok(self.evaluate_freshness(entry, max_age));
        }

        let row = sqlx::query_as::<_, (String, String, i64, Option<i64>)>(
            "SELECT url_key, document_json, strftime('%s', stored_at), ttl_hint_secs FROM index_entries WHERE url_key = ? AND fingerprint = ?",
        )
        .bind(url_key)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        let Some((_, document_json, stored_at_epoch, ttl_hint_secs)) = row else {
            return Ok(Lookup::Miss);
        };

        let document: Document = serde_json::from_str(&document_json)?;
        let stored_at = chrono::DateTime::from_timestamp(stored_at_epoch, 0).unwrap_or_else(Utc::now);
        let entry = CacheEntry {
            url_key: url_key.to_string(),
            fingerprint: fingerprint.to_string(),
            document,
            stored_at,
            ttl_hint: ttl_hint_secs.map(chrono::Duration::seconds),
        };

        self.read_cache.lock().put(key, entry.clone());
        Ok(self.evaluate_freshness(entry, max_age))
    }

    fn evaluate_freshness(&self, entry: CacheEntry, max_age: Option<StdDuration>) -> Lookup {
        if let Some(max_age) = max_age {
            let age = Utc::now().signed_duration_since(entry.stored_at);
            if age > chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX) {
                return Lookup::Miss;
            }
        }

        let mut doc = entry.document;
        doc.metadata.cache_state = crate::domain::CacheState::Hit;
        doc.metadata.cached_at = Some(entry.stored_at);
        Lookup::Hit(doc)
    }

    /// `store(url, options, doc, ttlHint) -> void`. Only called for
    /// cacheable documents (`Document::is_cacheable`); callers are expected
    /// to have checked `storeInCache`.
    pub async fn store(
        &self,
        url_key: &str,
        fingerprint: &str,
        document: &Document,
        ttl_hint: Option<StdDuration>,
    ) -> anyhow::Result<()> {
        let document_json = serde_json::to_string(document)?;
        let ttl_hint_secs = ttl_hint.map(|d| d.as_secs() as i64);

        sqlx::query(
            "INSERT INTO index_entries (url_key, fingerprint, document_json, stored_at, ttl_hint_secs)
             VALUES (?, ?, ?, datetime('now'), ?)
             ON CONFLICT(url_key, fingerprint) DO UPDATE SET
               document_json = excluded.document_json,
               stored_at = excluded.stored_at,
               ttl_hint_secs = excluded.ttl_hint_secs",
        )
        .bind(url_key)
        .bind(fingerprint)
        .bind(&document_json)
        .bind(ttl_hint_secs)
        .execute(&self.pool)
        .await?;

        let entry = CacheEntry {
            url_key: url_key.to_string(),
            fingerprint: fingerprint.to_string(),
            document: document.clone(),
            stored_at: Utc::now(),
            ttl_hint: ttl_hint.map(|d| chrono::Duration::seconds(d.as_secs() as i64)),
        };
        self.read_cache.lock().put((url_key.to_string(), fingerprint.to_string()), entry);

        Ok(())
    }

    /// Most recently indexed version for `(urlKey, changeTrackingTag)`, used
    /// by the `changeTracking` post-processor.
    pub async fn most_recent_for_change_tracking(&self, url_key: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT document_json FROM index_entries WHERE url_key = ? ORDER BY stored_at DESC LIMIT 1",
        )
        .bind(url_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((json,)) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }
}
