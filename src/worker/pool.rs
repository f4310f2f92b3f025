//! Background worker pool: the `tokio::spawn`-driven loop that continuously
//! drains the Job Queue, directly analogous to the teacher's bounded
//! `FuturesUnordered` crawl loop in `crawl_engine::core::crawl_pages`.

use std::sync::Arc;
use std::time::Duration;

use crate::crawl::CrawlEngine;
use crate::domain::{CrawlError as DomainCrawlError, JobMode};
use crate::errors::{CoreError, FetchError};
use crate::queue::JobQueue;

use super::ScrapeWorker;

/// Spawns `concurrency` identical poll loops, each repeatedly reserving a
/// job, processing it, and reporting the outcome back to the queue (and, for
/// crawl children, back to the `CrawlEngine` for fan-out/completion).
pub fn spawn_worker_pool(
    concurrency: usize,
    queue: Arc<JobQueue>,
    worker: Arc<ScrapeWorker>,
    crawl_engine: Arc<CrawlEngine>,
) -> Vec<tokio::task::JoinHandle<()>> {
    (0..concurrency.max(1))
        .map(|_| {
            let queue = Arc::clone(&queue);
            let worker = Arc::clone(&worker);
            let crawl_engine = Arc::clone(&crawl_engine);
            tokio::spawn(poll_loop(queue, worker, crawl_engine))
        })
        .collect()
}

async fn poll_loop(queue: Arc<JobQueue>, worker: Arc<ScrapeWorker>, crawl_engine: Arc<CrawlEngine>) {
    loop {
        match queue.reserve().await {
            Ok(Some(job)) => {
                let job_id = job.id;
                let is_cancelled = queue.is_cancelled(job_id).await.unwrap_or(false);

                let result = worker.process(&job, is_cancelled, true).await;

                match &result {
                    Ok(document) => {
                        let result_json = serde_json::to_string(document).unwrap_or_default();
                        let _ = queue.complete(job_id, &result_json).await;
                    }
                    Err(e) => {
                        let fetch_err = match e {
                            CoreError::Adapter(fe) => fe.clone(),
                            _ => FetchError::EngineSpecific(e.to_string()),
                        };
                        let _ = queue.fail(job_id, &fetch_err).await;
                    }
                }

                if matches!(job.mode, JobMode::CrawlChild | JobMode::BatchChild) {
                    if let Some(crawl_id) = job.crawl_id {
                        // Batch children never fan out further discovery —
                        // only crawl children feed their links back into the
                        // frontier.
                        let (success, error, links) = match &result {
                            Ok(document) => (
                                true,
                                None,
                                if job.mode == JobMode::CrawlChild {
                                    document.formats.links.clone().unwrap_or_default()
                                } else {
                                    Vec::new()
                                },
                            ),
                            Err(e) => (
                                false,
                                Some(DomainCrawlError {
                                    url: job.url.clone(),
                                    code: "ENGINE_ERROR".to_string(),
                                    message: e.to_string(),
                                }),
                                Vec::new(),
                            ),
                        };
                        let _ = crawl_engine
                            .on_child_finished(job.team_id, crawl_id, success, error, links, &job.options, job.credential.clone())
                            .await;
                    }
                }
            }
            Ok(None) => tokio::time::sleep(Duration::from_millis(200)).await,
            Err(e) => {
                tracing::error!(error = %e, "job queue reservation failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
