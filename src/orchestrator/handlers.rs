//! Axum handlers for the HTTP surface. Synchronous `/scrape` calls the
//! worker directly and relies on its own `job_log` write for later status
//! reads; `/crawl`, `/batch/scrape`, `/map`, `/extract` go through the Job
//! Queue + Crawl Engine and the background worker pool drains them.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{CrawlState, JobMode, ScrapeJob};
use crate::errors::CoreError;

use super::auth::{authenticate, extract_bearer};
use super::dto::*;
use super::error::ApiError;
use super::state::AppState;

fn validate_url(url: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(url).map_err(|_| CoreError::Validation("url is not a valid absolute URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CoreError::Validation("url must be http(s)".to_string()).into());
    }
    Ok(())
}

fn estimate_credits(options: &crate::domain::ScrapeJobOptions, costs: &crate::config::CreditCosts) -> f64 {
    let is_llm_format = options
        .formats
        .iter()
        .any(|f| matches!(f.as_str(), "json" | "extract" | "summary"));
    if is_llm_format {
        costs.per_page * costs.llm_format_multiplier
    } else {
        costs.per_page
    }
}

pub async fn scrape(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ScrapeRequest>) -> Result<Json<Value>, ApiError> {
    validate_url(&req.url)?;
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "scrape").await?;

    let options = req.into_job_options();
    if estimate_credits(&options, state.config.credit_costs()) > auc.credits_remaining {
        return Err(CoreError::Billing.into());
    }

    let job = ScrapeJob::new(auc.team, req.url, options, JobMode::Single)
        .with_credential(credential)
        .with_concurrency_cap(auc.concurrency_max);
    let document = state.worker.process(&job, false, true).await?;

    Ok(Json(json!({ "success": true, "data": document })))
}

pub async fn get_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "scrape").await?;

    let Some(row) = state.job_log.lookup_for_status(id).await.map_err(CoreError::Other)? else {
        return Err(CoreError::NotFound("scrape job".to_string()).into());
    };
    if row.team_id != auc.team {
        return Err(CoreError::Authorization.into());
    }
    if !row.success {
        return Err(CoreError::Engine {
            code: row.message.unwrap_or_else(|| "scrape failed".to_string()),
        }
        .into());
    }

    let blob = state.blob_store.get(&id.to_string()).await.map_err(CoreError::Other)?;
    let Some(bytes) = blob else {
        return Err(CoreError::NotFound("scrape result".to_string()).into());
    };
    let document: crate::domain::Document = serde_json::from_slice(&bytes).map_err(|e| CoreError::Other(e.into()))?;
    Ok(Json(json!({ "success": true, "data": document })))
}

pub async fn start_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CrawlRequest>,
) -> Result<Json<CrawlStartResponse>, ApiError> {
    validate_url(&req.url)?;
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "crawl").await?;

    let options = crate::domain::CrawlOptions {
        limit: req.limit,
        max_depth: req.max_depth,
        max_discovery_depth: req.max_discovery_depth,
        include_paths: req.include_paths,
        exclude_paths: req.exclude_paths,
        regex_on_full_url: req.regex_on_full_url,
        ignore_sitemap: req.ignore_sitemap,
        allow_backward_links: req.allow_backward_links,
        crawl_entire_domain: req.crawl_entire_domain,
        allow_subdomains: req.allow_subdomains,
        delay_ms: req.delay,
        max_concurrency: req.max_concurrency,
        ignore_robots_txt: req.ignore_robots_txt,
        zero_data_retention: req.zero_data_retention,
    };
    let scrape_options = req.scrape_options.unwrap_or_default().into_job_options();

    let crawl = state
        .crawl_engine
        .start(auc.team, auc.concurrency_max, &req.url, options, scrape_options, Some(credential), false)
        .await?;

    Ok(Json(CrawlStartResponse { success: true, id: crawl.id }))
}

fn crawl_status_wire(state: CrawlState) -> CrawlStatusWire {
    match state {
        CrawlState::Scraping => CrawlStatusWire::Scraping,
        CrawlState::Completed => CrawlStatusWire::Completed,
        CrawlState::Cancelled => CrawlStatusWire::Cancelled,
        CrawlState::Failed => CrawlStatusWire::Failed,
    }
}

pub async fn get_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CrawlStatusResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "crawl").await?;

    let Some(crawl) = state.crawl_engine.get(auc.team, id).await else {
        return Err(CoreError::NotFound("crawl".to_string()).into());
    };

    let job_ids = state.job_log.job_ids_for_crawl(id, true).await.map_err(CoreError::Other)?;
    let mut data = Vec::with_capacity(job_ids.len());
    for job_id in job_ids {
        if let Some(bytes) = state.blob_store.get(&job_id.to_string()).await.map_err(CoreError::Other)? {
            if let Ok(doc) = serde_json::from_slice(&bytes) {
                data.push(doc);
            }
        }
    }

    Ok(Json(CrawlStatusResponse {
        status: crawl_status_wire(crawl.state),
        completed: crawl.completed,
        total: crawl.discovered.len(),
        data,
    }))
}

pub async fn get_crawl_errors(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<CrawlErrorsResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "crawl").await?;

    let Some(crawl) = state.crawl_engine.get(auc.team, id).await else {
        return Err(CoreError::NotFound("crawl".to_string()).into());
    };

    Ok(Json(CrawlErrorsResponse {
        errors: crawl
            .errors
            .into_iter()
            .map(|e| CrawlErrorWire {
                url: e.url,
                error: e.message,
                code: e.code,
            })
            .collect(),
        robots_blocked: crawl.robots_blocked,
    }))
}

pub async fn get_ongoing_crawls(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<OngoingCrawlsResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "crawl").await?;

    let crawls = state
        .crawl_engine
        .ongoing(auc.team)
        .await
        .into_iter()
        .map(|c| OngoingCrawlWire {
            id: c.id,
            created_at: c.created_at,
        })
        .collect();

    Ok(Json(OngoingCrawlsResponse { crawls }))
}

pub async fn cancel_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "crawl").await?;

    state.crawl_engine.cancel(auc.team, id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn batch_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BatchScrapeRequest>,
) -> Result<Json<CrawlStartResponse>, ApiError> {
    for url in &req.urls {
        validate_url(url)?;
    }
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "batch").await?;

    let scrape_options = req.scrape_options.into_job_options();
    let crawl = state
        .crawl_engine
        .start_batch(auc.team, auc.concurrency_max, req.urls, scrape_options, Some(credential))
        .await?;

    Ok(Json(CrawlStartResponse { success: true, id: crawl.id }))
}

pub async fn map(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<MapRequest>) -> Result<Json<MapResponse>, ApiError> {
    validate_url(&req.url)?;
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "map").await?;

    if state.config.credit_costs().map_call > auc.credits_remaining {
        return Err(CoreError::Billing.into());
    }

    let options = crate::domain::CrawlOptions {
        limit: req.limit,
        ignore_sitemap: req.ignore_sitemap,
        allow_subdomains: req.include_subdomains,
        ..crate::domain::CrawlOptions::default()
    };
    let mut discovered = state.crawl_engine.map(auc.team, auc.concurrency_max, &req.url, options).await?;

    if let Some(query) = &req.search {
        let query_lower = query.to_lowercase();
        discovered.retain(|url| url.to_lowercase().contains(&query_lower));
    }

    let mut billing_op = crate::domain::BillingOperation::new(auc.team, state.config.credit_costs().map_call, None, false);
    billing_op = billing_op.with_credential(credential);
    state.billing.queue_op(billing_op).await;

    let total = discovered.len();
    Ok(Json(MapResponse {
        success: true,
        web: Vec::new(),
        links: discovered,
        metadata: MapMetadata {
            total_count: total,
            has_more: false,
            search_query: req.search,
        },
    }))
}

pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "search").await?;

    let limit = req.limit.unwrap_or(10);
    let results = state.web_search.search(&req.query, limit).await.map_err(CoreError::Other)?;

    let scrape_options = req.scrape_options.into_job_options();
    let mut documents = Vec::with_capacity(results.len());
    for result in results {
        let job = ScrapeJob::new(auc.team, result.url, scrape_options.clone(), JobMode::Single)
            .with_credential(credential.clone())
            .with_concurrency_cap(auc.concurrency_max);
        // bill=false: search charges one credit per returned document below,
        // not the worker's own per-page rate, so the per-job billing op is
        // suppressed here to avoid billing each scrape twice.
        match state.worker.process(&job, false, false).await {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!(error = %e, "search result scrape failed"),
        }
    }

    let billing_op = crate::domain::BillingOperation::new(
        auc.team,
        state.config.credit_costs().search_per_document * documents.len() as f64,
        None,
        false,
    )
    .with_credential(credential);
    state.billing.queue_op(billing_op).await;

    Ok(Json(SearchResponse {
        success: true,
        data: documents,
    }))
}

pub async fn start_extract(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ExtractRequest>,
) -> Result<Json<CrawlStartResponse>, ApiError> {
    for url in &req.urls {
        validate_url(url)?;
    }
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "extract").await?;

    let mut scrape_options = crate::domain::ScrapeJobOptions {
        formats: vec!["extract".to_string()],
        json_schema: Some(req.schema),
        ..crate::domain::ScrapeJobOptions::default()
    };
    scrape_options.store_in_cache = true;

    let crawl = state
        .crawl_engine
        .start_batch(auc.team, auc.concurrency_max, req.urls, scrape_options, Some(credential))
        .await?;

    Ok(Json(CrawlStartResponse { success: true, id: crawl.id }))
}

pub async fn get_extract(state: State<AppState>, headers: HeaderMap, id: Path<Uuid>) -> Result<Json<CrawlStatusResponse>, ApiError> {
    get_crawl(state, headers, id).await
}

pub async fn credit_usage(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CreditUsageResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "scrape").await?;
    Ok(Json(CreditUsageResponse {
        remaining_credits: auc.credits_remaining,
    }))
}

pub async fn token_usage(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<TokenUsageResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    // This core's Accounts collaborator doesn't surface a token ledger
    // distinct from credits; report the same balance rather than fabricate one.
    let auc = authenticate(&state, &credential, "scrape").await?;
    Ok(Json(TokenUsageResponse {
        remaining_tokens: auc.credits_remaining,
    }))
}

pub async fn concurrency_check(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<ConcurrencyCheckResponse>, ApiError> {
    let credential = extract_bearer(&headers)?;
    let auc = authenticate(&state, &credential, "scrape").await?;
    Ok(Json(ConcurrencyCheckResponse {
        concurrency: state.governor.in_flight(auc.team),
        max_concurrency: auc.concurrency_max,
    }))
}
