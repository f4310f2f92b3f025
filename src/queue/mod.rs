//! Job Queue: a durable, priority-banded FIFO of scrape jobs with
//! lease-based reservation, retry policy, and atomic cancellation.
//!
//! Persistence follows the teacher's SQLite (WAL) + durable-row pattern;
//! the weighted round-robin band selection generalizes the batching
//! worker's "drain in priority order" idea from a single queue to three.

mod band;

pub use band::PriorityBand;

use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::{ScrapeJob, ScrapeJobState};
use crate::errors::FetchError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    team_id TEXT NOT NULL,
    crawl_id TEXT,
    band TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    visible_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    cancelled INTEGER NOT NULL DEFAULT 0,
    result_json TEXT,
    error TEXT
);
CREATE INDEX IF NOT EXISTS idx_jobs_band_state ON jobs(band, state, visible_at);
CREATE INDEX IF NOT EXISTS idx_jobs_crawl_id ON jobs(crawl_id);
"#;

pub struct JobQueue {
    pool: SqlitePool,
    lease_duration: Duration,
    max_retries: u32,
    weights: (u32, u32, u32),
    round: std::sync::atomic::AtomicU64,
}

impl JobQueue {
    pub async fn open(database_url: &str, lease_duration: Duration, max_retries: u32, weights: (u32, u32, u32)) -> anyhow::Result<Self> {
        let options: SqliteConnectOptions = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            lease_duration,
            max_retries,
            weights,
            round: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// `enqueue(job, {priority, delay}) -> jobId`
    pub async fn enqueue(&self, job: &ScrapeJob, priority: PriorityBand, delay: Option<Duration>) -> anyhow::Result<Uuid> {
        let visible_at = Utc::now() + chrono::Duration::from_std(delay.unwrap_or_default()).unwrap_or_default();
        let payload_json = serde_json::to_string(job)?;

        sqlx::query(
            "INSERT INTO jobs (job_id, team_id, crawl_id, band, payload_json, state, attempts, visible_at, created_at, cancelled)
             VALUES (?, ?, ?, ?, ?, 'queued', 0, ?, ?, 0)",
        )
        .bind(job.id.to_string())
        .bind(job.team_id.to_string())
        .bind(job.crawl_id.map(|id| id.to_string()))
        .bind(priority.as_str())
        .bind(&payload_json)
        .bind(visible_at.to_rfc3339())
        .bind(job.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(job.id)
    }

    /// `reserve(worker) -> Job|none`. Weighted round-robin across bands:
    /// the caller's draw picks which band to try first this call, and falls
    /// through to the others if empty, so backlog in one band never
    /// starves the others outright.
    pub async fn reserve(&self) -> anyhow::Result<Option<ScrapeJob>> {
        for band in self.band_order() {
            if let Some(job) = self.reserve_from_band(band).await? {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    fn band_order(&self) -> Vec<PriorityBand> {
        let (rt, cr, bg) = self.weights;
        let total = (rt + cr + bg).max(1) as u64;
        let n = self.round.fetch_add(1, std::sync::atomic::Ordering::Relaxed) % total;
        let primary = if n < rt as u64 {
            PriorityBand::Realtime
        } else if n < (rt + cr) as u64 {
            PriorityBand::Crawl
        } else {
            PriorityBand::Background
        };
        let mut order = vec![primary];
        for band in [PriorityBand::Realtime, PriorityBand::Crawl, PriorityBand::Background] {
            if band != primary {
                order.push(band);
            }
        }
        order
    }

    async fn reserve_from_band(&self, band: PriorityBand) -> anyhow::Result<Option<ScrapeJob>> {
        let now = Utc::now();
        let new_visible_at = now + chrono::Duration::from_std(self.lease_duration).unwrap_or_default();

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT job_id, payload_json FROM jobs
             WHERE band = ? AND state IN ('queued', 'active') AND visible_at <= ? AND cancelled = 0
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(band.as_str())
        .bind(now.to_rfc3339())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((job_id, payload_json)) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE jobs SET state = 'active', attempts = attempts + 1, visible_at = ? WHERE job_id = ?",
        )
        .bind(new_visible_at.to_rfc3339())
        .bind(&job_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut job: ScrapeJob = serde_json::from_str(&payload_json)?;
        job.state = ScrapeJobState::Active;
        Ok(Some(job))
    }

    /// `complete(jobId, result)`
    pub async fn complete(&self, job_id: Uuid, result_json: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE jobs SET state = 'completed', result_json = ? WHERE job_id = ?")
            .bind(result_json)
            .bind(job_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// `fail(jobId, err, retryPolicy)`: transient errors are retried with
    /// exponential backoff up to `max_retries`; everything else (including
    /// a non-adapter validation failure) goes straight to `failed`.
    pub async fn fail(&self, job_id: Uuid, err: &FetchError) -> anyhow::Result<()> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT attempts FROM jobs WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let attempts = row.map(|(a,)| a as u32).unwrap_or(0);

        if err.is_transient() && attempts < self.max_retries {
            let backoff = Duration::from_millis(200 * 2u64.pow(attempts));
            let visible_at = Utc::now() + chrono::Duration::from_std(backoff).unwrap_or_default();
            sqlx::query("UPDATE jobs SET state = 'queued', visible_at = ? WHERE job_id = ?")
                .bind(visible_at.to_rfc3339())
                .bind(job_id.to_string())
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE jobs SET state = 'failed', error = ? WHERE job_id = ?")
                .bind(err.to_string())
                .bind(job_id.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// `cancel(jobId)`: sets a tombstone observed by the worker on
    /// completion/before heavy steps; in-flight work finishes fetching but
    /// the result is discarded.
    pub async fn cancel(&self, job_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE jobs SET cancelled = 1 WHERE job_id = ?")
            .bind(job_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Tombstones every non-terminal job tagged with `crawl_id`, used to
    /// cascade a `DELETE /v<n>/crawl/:id` onto its still-queued children.
    pub async fn cancel_by_crawl(&self, crawl_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET cancelled = 1 WHERE crawl_id = ? AND state IN ('queued', 'active')",
        )
        .bind(crawl_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn is_cancelled(&self, job_id: Uuid) -> anyhow::Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT cancelled FROM jobs WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(c,)| c != 0).unwrap_or(false))
    }

    /// `getProgress(jobId)`
    pub async fn progress(&self, job_id: Uuid) -> anyhow::Result<Option<(ScrapeJobState, u32)>> {
        let row = sqlx::query_as::<_, (String, i64)>("SELECT state, attempts FROM jobs WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(state, attempts)| (parse_state(&state), attempts as u32)))
    }
}

fn parse_state(s: &str) -> ScrapeJobState {
    match s {
        "queued" => ScrapeJobState::Queued,
        "active" => ScrapeJobState::Active,
        "completed" => ScrapeJobState::Completed,
        _ => ScrapeJobState::Failed,
    }
}
