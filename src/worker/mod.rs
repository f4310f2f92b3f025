//! Scrape Worker: pulls jobs, invokes Fetcher adapters with a fallback
//! chain, applies post-processors, writes to the Index, and emits lifecycle
//! events. Structure follows the teacher's `crawl_pages`/`process_single_page`
//! split: a generic `WorkerObserver` trait (the `ProgressReporter` idiom)
//! lets the same pipeline run silently in tests or publish onto a live
//! event bus in production.

pub mod pool;
pub mod postprocess;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::adapters::{Accounts, BlobStore, FetchOptions, Fetcher, Llm};
use crate::billing::BillingBatcher;
use crate::concurrency::ConcurrencyGovernor;
use crate::domain::{CacheState, ChangeTracking, Document, DocumentFormats, DocumentMetadata, ScrapeJob};
use crate::errors::{CoreError, FetchError};
use crate::events::{CoreEvent, CoreEventBus};
use crate::index::{fingerprint, normalize_for_index, FingerprintInput, Lookup, ResultIndex};
use crate::zdr::{JobLogEntry, JobLogStore};

/// Lifecycle observer the worker reports into; `NoOpObserver` is the
/// silent default used by unit tests.
pub trait WorkerObserver: Send + Sync {
    fn on_event(&self, _event: CoreEvent) {}
}

pub struct NoOpObserver;
impl WorkerObserver for NoOpObserver {}

pub struct EventBusObserver(pub Arc<CoreEventBus>);
impl WorkerObserver for EventBusObserver {
    fn on_event(&self, event: CoreEvent) {
        self.0.publish(event);
    }
}

pub struct ScrapeWorker {
    fetcher_chain: Vec<Arc<dyn Fetcher>>,
    llm: Arc<dyn Llm>,
    blob_store: Arc<dyn BlobStore>,
    accounts: Arc<dyn Accounts>,
    index: Arc<ResultIndex>,
    governor: Arc<ConcurrencyGovernor>,
    billing: Arc<BillingBatcher>,
    observer: Arc<dyn WorkerObserver>,
    credit_costs: crate::config::CreditCosts,
    job_log: Arc<JobLogStore>,
    zdr_lookback: Duration,
}

impl ScrapeWorker {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher_chain: Vec<Arc<dyn Fetcher>>,
        llm: Arc<dyn Llm>,
        blob_store: Arc<dyn BlobStore>,
        accounts: Arc<dyn Accounts>,
        index: Arc<ResultIndex>,
        governor: Arc<ConcurrencyGovernor>,
        billing: Arc<BillingBatcher>,
        observer: Arc<dyn WorkerObserver>,
        credit_costs: crate::config::CreditCosts,
        job_log: Arc<JobLogStore>,
        zdr_lookback: Duration,
    ) -> Self {
        Self {
            fetcher_chain,
            llm,
            blob_store,
            accounts,
            index,
            governor,
            billing,
            observer,
            credit_costs,
            job_log,
            zdr_lookback,
        }
    }

    /// `process(job) -> Document | Error`. `is_cancelled` is resolved by the
    /// caller (typically a single `JobQueue::is_cancelled` read) before the
    /// pipeline starts; cancellation past admission is observed by the
    /// caller discarding the result rather than by polling mid-pipeline.
    /// `bill` suppresses the per-job billing op queued in step 8 — callers
    /// that bill the batch themselves (e.g. `search`, which bills one credit
    /// per returned document rather than per underlying scrape) pass `false`.
    pub async fn process(&self, job: &ScrapeJob, is_cancelled: bool, bill: bool) -> Result<Document, CoreError> {
        // 1. Admission
        if is_cancelled {
            return Err(CoreError::NotFound("job was cancelled".to_string()));
        }
        if job.options.wait_for_ms.unwrap_or(0) as u128 > job.options.timeout().as_millis() / 2 {
            return Err(CoreError::Validation(
                "waitFor must not exceed half of timeout".to_string(),
            ));
        }

        let lease = self
            .governor
            .clone()
            .acquire(job.team_id, job.id, Duration::from_secs(120), job.concurrency_cap)
            .await;

        self.observer.on_event(CoreEvent::JobStarted { job_id: job.id });

        let started = std::time::Instant::now();
        let result = self.process_inner(job, bill).await;
        let time_taken_ms = started.elapsed().as_millis() as u64;

        drop(lease);

        match &result {
            Ok(_) => self.observer.on_event(CoreEvent::JobCompleted { job_id: job.id }),
            Err(e) => self.observer.on_event(CoreEvent::JobFailed {
                job_id: job.id,
                message: e.to_string(),
            }),
        }

        let log_entry = JobLogEntry {
            job_id: job.id,
            team_id: job.team_id,
            crawl_id: job.crawl_id,
            url: Some(job.url.clone()),
            page_options: serde_json::to_string(&job.options).ok(),
            crawler_options: None,
            success: result.is_ok(),
            message: result.as_ref().err().map(ToString::to_string),
            num_docs: u32::from(result.is_ok()),
            time_taken_ms,
            tokens_billed: 0.0,
            zdr: job.zdr,
            request_scoped_zdr: job.options.request_scoped_zdr,
        };
        if let Err(e) = self.job_log.record(&log_entry, self.zdr_lookback).await {
            tracing::error!(job_id = %job.id, error = %e, "failed to write job log row");
        }

        result
    }

    async fn process_inner(&self, job: &ScrapeJob, bill: bool) -> Result<Document, CoreError> {
        let url_key = normalize_for_index(&job.url);

        // 2. Cache
        let fp_input = FingerprintInput {
            formats: &job.options.formats,
            headers: &job.options.headers,
            mobile: job.options.mobile,
            location_country: job.options.location_country.as_deref(),
            block_ads: job.options.block_ads,
            proxy: job.options.proxy,
            has_actions: job.options.has_actions,
        };
        let fp = fingerprint(&fp_input);

        if job.options.max_age_ms != Some(0) {
            if let Lookup::Hit(doc) = self
                .index
                .lookup(&url_key, &fp, Some(job.options.max_age()))
                .await
                .map_err(CoreError::Other)?
            {
                return Ok(Document {
                    source_url: job.url.clone(),
                    ..doc
                });
            }
        }

        // 3-5. Plan + pre-checks + fetch, via fallback chain
        let fetch_url = rewrite_pdf_url(&job.url);
        if is_pdf_url(&fetch_url) {
            let min_pdf_timeout = Duration::from_secs(20);
            if job.options.timeout() < min_pdf_timeout {
                return Err(CoreError::Validation("InsufficientPDFTime".to_string()));
            }
        }

        let opts = FetchOptions {
            headers: job.options.headers.clone(),
            wait_for: job.options.wait_for_ms.map(Duration::from_millis),
            proxy: job.options.proxy,
            timeout: job.options.timeout(),
            viewport: None,
            mobile: job.options.mobile,
        };

        let fetched = self.fetch_with_chain(&fetch_url, &opts).await?;

        // 6. Post-process
        let mut formats = DocumentFormats::default();
        let html = String::from_utf8_lossy(&fetched.body).to_string();

        for format in &job.options.formats {
            match format.as_str() {
                "markdown" => {
                    formats.markdown = Some(postprocess::to_markdown(&html).map_err(CoreError::Other)?);
                }
                "rawHtml" => formats.raw_html = Some(html.clone()),
                "links" => formats.links = Some(postprocess::extract_links(&html, &fetched.final_url)),
                "screenshot" | "screenshot@fullPage" => {
                    use base64::Engine as _;
                    formats.screenshot = Some(base64::engine::general_purpose::STANDARD.encode(&fetched.body));
                }
                "json" => {
                    let schema = job
                        .options
                        .json_schema
                        .as_ref()
                        .map(|s| s.to_string())
                        .or_else(|| job.options.json_prompt.clone())
                        .unwrap_or_default();
                    formats.json = Some(
                        postprocess::run_json_extraction(self.llm.as_ref(), &schema, &html)
                            .await
                            .map_err(|e| CoreError::Engine { code: e.0 })?,
                    );
                }
                "extract" => {
                    let schema = job
                        .options
                        .json_schema
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_default();
                    formats.extract = Some(
                        postprocess::run_json_extraction(self.llm.as_ref(), &schema, &html)
                            .await
                            .map_err(|e| CoreError::Engine { code: e.0 })?,
                    );
                }
                "summary" => {
                    formats.summary = Some(
                        postprocess::run_summary(self.llm.as_ref(), &html)
                            .await
                            .map_err(|e| CoreError::Engine { code: e.0 })?,
                    );
                }
                "changeTracking" => {
                    let markdown = formats
                        .markdown
                        .clone()
                        .unwrap_or_else(|| postprocess::to_markdown(&html).unwrap_or_default());
                    let tracking: ChangeTracking = postprocess::run_change_tracking(
                        &self.index,
                        &url_key,
                        job.options.change_tracking_tag.as_deref(),
                        &markdown,
                    )
                    .await
                    .map_err(CoreError::Other)?;
                    formats.change_tracking = Some(tracking);
                }
                _ => {}
            }
        }

        let document = Document {
            scrape_id: job.id,
            source_url: job.url.clone(),
            normalized_url: url_key.clone(),
            final_url: fetched.final_url.clone(),
            status_code: fetched.status,
            formats,
            metadata: DocumentMetadata {
                proxy_used: fetched.proxy_used.clone(),
                cache_state: CacheState::Miss,
                cached_at: None,
                scrape_id: job.id,
                source_url: job.url.clone(),
            },
            error: None,
        };

        // 7. ZDR
        if !job.zdr && job.options.store_in_cache && document.is_cacheable() {
            self.index
                .store(&url_key, &fp, &document, Some(job.options.max_age()))
                .await
                .map_err(CoreError::Other)?;
        }
        // Persist the document for later `GET /v<n>/scrape/:id` reads, keyed
        // by job id. ZDR blob cleanup is deferred to the periodic sweep (see
        // `zdr` module) driven by the `dr_clean_by` stamp the job-log row
        // carries; the worker itself never deletes on the hot path.
        let document_json = serde_json::to_vec(&document).map_err(|e| CoreError::Other(e.into()))?;
        self.blob_store
            .put(&job.id.to_string(), document_json, "application/json")
            .await
            .map_err(CoreError::Other)?;

        // 8. Bill
        if bill {
            let is_llm_format = job
                .options
                .formats
                .iter()
                .any(|f| matches!(f.as_str(), "json" | "extract" | "summary"));
            let credits = if is_llm_format {
                self.credit_costs.per_page * self.credit_costs.llm_format_multiplier
            } else {
                self.credit_costs.per_page
            };
            let mut billing_op = crate::domain::BillingOperation::new(job.team_id, credits, None, is_llm_format);
            if let Some(credential) = &job.credential {
                billing_op = billing_op.with_credential(credential.clone());
            }
            self.billing.queue_op(billing_op).await;
        }

        Ok(document)
    }

    async fn fetch_with_chain(
        &self,
        url: &str,
        opts: &FetchOptions,
    ) -> Result<crate::adapters::FetchResponse, CoreError> {
        let mut last_err = None;
        for adapter in &self.fetcher_chain {
            match adapter.fetch(url, opts).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() => {
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(CoreError::Adapter(e)),
            }
        }
        Err(CoreError::Adapter(last_err.unwrap_or(FetchError::EngineSpecific(
            "no fetcher adapters configured".to_string(),
        ))))
    }
}

#[must_use]
fn is_pdf_url(url: &str) -> bool {
    url.to_lowercase().ends_with(".pdf")
}

/// PDF URLs and Google Docs/Slides "view" URLs are rewritten to their PDF
/// download form and routed to the PDF adapter.
#[must_use]
fn rewrite_pdf_url(url: &str) -> String {
    if let Some(doc_id) = google_doc_id(url) {
        return format!("https://docs.google.com/document/d/{doc_id}/export?format=pdf");
    }
    if let Some(slide_id) = google_slides_id(url) {
        return format!("https://docs.google.com/presentation/d/{slide_id}/export/pdf");
    }
    url.to_string()
}

fn google_doc_id(url: &str) -> Option<&str> {
    extract_between(url, "docs.google.com/document/d/")
}

fn google_slides_id(url: &str) -> Option<&str> {
    extract_between(url, "docs.google.com/presentation/d/")
}

fn extract_between<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find('/').unwrap_or(rest.len());
    Some(&rest[..end])
}
