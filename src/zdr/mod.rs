//! ZDR Cleaner: enforces zero-data-retention by redacting payload fields at
//! write time and deferring blob cleanup to a periodic sweep.
//!
//! The job log itself follows the teacher's `link_index::LinkIndex`
//! SQLite-WAL persistence shape; the sweep loop is the same
//! `tokio::time::interval` idiom the billing flush and browser-pool scaler
//! use elsewhere in the teacher repo.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::BlobStore;
use crate::domain::TeamId;
use crate::events::{CoreEvent, CoreEventBus};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS job_log (
    job_id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    crawl_id TEXT,
    url TEXT,
    page_options TEXT,
    crawler_options TEXT,
    success INTEGER NOT NULL,
    message TEXT,
    num_docs INTEGER NOT NULL DEFAULT 0,
    time_taken_ms INTEGER NOT NULL DEFAULT 0,
    tokens_billed REAL NOT NULL DEFAULT 0,
    dr_clean_by TEXT,
    request_scoped_zdr INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_job_log_dr_clean_by ON job_log(dr_clean_by);
"#;

/// Fields that must never be persisted when the originating job is ZDR.
#[derive(Debug, Clone)]
pub struct JobLogEntry {
    pub job_id: Uuid,
    pub team_id: TeamId,
    pub crawl_id: Option<Uuid>,
    pub url: Option<String>,
    pub page_options: Option<String>,
    pub crawler_options: Option<String>,
    pub success: bool,
    pub message: Option<String>,
    pub num_docs: u32,
    pub time_taken_ms: u64,
    pub tokens_billed: f64,
    pub zdr: bool,
    pub request_scoped_zdr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobLogRow {
    pub job_id: Uuid,
    pub team_id: TeamId,
    pub crawl_id: Option<Uuid>,
    pub url: Option<String>,
    pub success: bool,
    pub message: Option<String>,
    pub num_docs: u32,
    pub time_taken_ms: u64,
    pub tokens_billed: f64,
}

pub struct JobLogStore {
    pool: SqlitePool,
}

impl JobLogStore {
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Writes a job-log row, redacting `url`/`page_options`/`crawler_options`
    /// when the job is ZDR and stamping `dr_clean_by` `lookback`-bounded from
    /// now for the periodic sweep to pick up.
    pub async fn record(&self, entry: &JobLogEntry, lookback: Duration) -> anyhow::Result<()> {
        let (url, page_options, crawler_options, dr_clean_by) = if entry.zdr {
            let clean_by = Utc::now() + chrono::Duration::from_std(lookback).unwrap_or_default();
            (None, None, None, Some(clean_by.to_rfc3339()))
        } else {
            (entry.url.clone(), entry.page_options.clone(), entry.crawler_options.clone(), None)
        };

        sqlx::query(
            "INSERT INTO job_log
                (job_id, team_id, crawl_id, url, page_options, crawler_options, success, message,
                 num_docs, time_taken_ms, tokens_billed, dr_clean_by, request_scoped_zdr, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id) DO UPDATE SET
                success = excluded.success, message = excluded.message,
                num_docs = excluded.num_docs, time_taken_ms = excluded.time_taken_ms,
                tokens_billed = excluded.tokens_billed",
        )
        .bind(entry.job_id.to_string())
        .bind(entry.team_id.to_string())
        .bind(entry.crawl_id.map(|id| id.to_string()))
        .bind(url)
        .bind(page_options)
        .bind(crawler_options)
        .bind(entry.success as i64)
        .bind(&entry.message)
        .bind(entry.num_docs as i64)
        .bind(entry.time_taken_ms as i64)
        .bind(entry.tokens_billed)
        .bind(dr_clean_by)
        .bind(entry.request_scoped_zdr as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// `GET /v<n>/scrape/:id` status lookup: returns `None` (→ 404 at the
    /// orchestrator boundary) once a request-scoped-ZDR row has completed.
    pub async fn lookup_for_status(&self, job_id: Uuid) -> anyhow::Result<Option<JobLogRow>> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, Option<String>, i64, Option<String>, i64, i64, f64, i64)>(
            "SELECT job_id, team_id, crawl_id, url, success, message, num_docs, time_taken_ms, tokens_billed, request_scoped_zdr
             FROM job_log WHERE job_id = ?",
        )
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some((job_id_s, team_id_s, crawl_id_s, url, success, message, num_docs, time_taken_ms, tokens_billed, request_scoped_zdr)) = row
        else {
            return Ok(None);
        };

        if request_scoped_zdr != 0 && success != 0 {
            return Ok(None);
        }

        Ok(Some(JobLogRow {
            job_id: Uuid::parse_str(&job_id_s)?,
            team_id: TeamId(Uuid::parse_str(&team_id_s)?),
            crawl_id: crawl_id_s.map(|s| Uuid::parse_str(&s)).transpose()?,
            url,
            success: success != 0,
            message,
            num_docs: num_docs as u32,
            time_taken_ms: time_taken_ms as u64,
            tokens_billed,
        }))
    }

    /// Job ids logged under `crawl_id`, optionally restricted to successful
    /// ones — used by `GET /v<n>/crawl/:id` to assemble the completed
    /// document set without re-scanning the Job Queue.
    pub async fn job_ids_for_crawl(&self, crawl_id: Uuid, success_only: bool) -> anyhow::Result<Vec<Uuid>> {
        let query = if success_only {
            "SELECT job_id FROM job_log WHERE crawl_id = ? AND success = 1"
        } else {
            "SELECT job_id FROM job_log WHERE crawl_id = ?"
        };
        let rows = sqlx::query_as::<_, (String,)>(query)
            .bind(crawl_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|(id,)| Uuid::parse_str(&id).map_err(Into::into)).collect()
    }

    async fn due_for_cleanup(&self, lookback: Duration) -> anyhow::Result<Vec<String>> {
        let now = Utc::now();
        let earliest = now - chrono::Duration::from_std(lookback).unwrap_or_default();
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT job_id FROM job_log WHERE dr_clean_by IS NOT NULL AND dr_clean_by <= ? AND dr_clean_by >= ?",
        )
        .bind(now.to_rfc3339())
        .bind(earliest.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn clear_clean_by(&self, job_id: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE job_log SET dr_clean_by = NULL WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct ZdrCleaner;

impl ZdrCleaner {
    /// Spawns the periodic sweep: every `interval`, selects rows due for
    /// cleanup (bounded to `lookback` for index efficiency), deletes the
    /// associated blob, then clears `dr_clean_by`.
    pub fn spawn(
        store: Arc<JobLogStore>,
        blob_store: Arc<dyn BlobStore>,
        event_bus: Option<Arc<CoreEventBus>>,
        interval: Duration,
        lookback: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let due = match store.due_for_cleanup(lookback).await {
                    Ok(due) => due,
                    Err(e) => {
                        tracing::error!(error = %e, "zdr cleanup sweep failed to list due rows");
                        continue;
                    }
                };
                let mut swept = 0usize;
                for job_id in due {
                    if blob_store.delete(&job_id).await.is_ok() && store.clear_clean_by(&job_id).await.is_ok() {
                        swept += 1;
                    }
                }
                if swept > 0 {
                    tracing::info!(rows = swept, "zdr sweep cleaned blobs");
                    if let Some(bus) = &event_bus {
                        bus.publish(CoreEvent::ZdrSwept { rows: swept });
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockBlobStore;

    async fn open_store() -> JobLogStore {
        JobLogStore::open("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn zdr_job_redacts_payload_fields() {
        let store = open_store().await;
        let job_id = Uuid::new_v4();
        let entry = JobLogEntry {
            job_id,
            team_id: TeamId(Uuid::new_v4()),
            crawl_id: None,
            url: Some("https://example.com/secret".to_string()),
            page_options: Some("{}".to_string()),
            crawler_options: None,
            success: true,
            message: None,
            num_docs: 1,
            time_taken_ms: 10,
            tokens_billed: 1.0,
            zdr: true,
            request_scoped_zdr: false,
        };
        store.record(&entry, Duration::from_secs(604_800)).await.unwrap();

        let row: (Option<String>, Option<String>) =
            sqlx::query_as("SELECT url, page_options FROM job_log WHERE job_id = ?")
                .bind(job_id.to_string())
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(row, (None, None));
    }

    #[tokio::test]
    async fn request_scoped_zdr_hides_completed_status() {
        let store = open_store().await;
        let job_id = Uuid::new_v4();
        let entry = JobLogEntry {
            job_id,
            team_id: TeamId(Uuid::new_v4()),
            crawl_id: None,
            url: Some("https://example.com".to_string()),
            page_options: None,
            crawler_options: None,
            success: true,
            message: None,
            num_docs: 1,
            time_taken_ms: 5,
            tokens_billed: 1.0,
            zdr: false,
            request_scoped_zdr: true,
        };
        store.record(&entry, Duration::from_secs(604_800)).await.unwrap();

        assert!(store.lookup_for_status(job_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_deletes_due_blobs_and_clears_clean_by() {
        let store = Arc::new(open_store().await);
        let blob_store = Arc::new(MockBlobStore::default());
        let job_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO job_log (job_id, team_id, success, dr_clean_by, created_at)
             VALUES (?, ?, 1, ?, ?)",
        )
        .bind(job_id.to_string())
        .bind(Uuid::new_v4().to_string())
        .bind((Utc::now() - chrono::Duration::seconds(1)).to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&store.pool)
        .await
        .unwrap();

        let due = store.due_for_cleanup(Duration::from_secs(604_800)).await.unwrap();
        assert_eq!(due, vec![job_id.to_string()]);

        blob_store.delete(&job_id.to_string()).await.unwrap();
        store.clear_clean_by(&job_id.to_string()).await.unwrap();

        let due_after = store.due_for_cleanup(Duration::from_secs(604_800)).await.unwrap();
        assert!(due_after.is_empty());
    }
}
