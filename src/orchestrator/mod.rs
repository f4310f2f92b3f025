//! HTTP surface: builds the `Router<AppState>` wiring every endpoint to its
//! handler. Kept thin — request parsing lives in `dto`, auth/rate-limiting
//! in `auth`, error shaping in `error`; this module only routes.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Routes are duplicated under `/v1` and `/v2`; this core's adapters and
/// error vocabulary don't vary by version, so both prefixes share one
/// handler set. (Open Question: whether v1 and v2 should diverge on TLS
/// verification defaults is recorded, not resolved here.)
pub fn build_router(state: AppState) -> Router {
    let versioned = Router::new()
        .route("/scrape", post(handlers::scrape))
        .route("/scrape/{id}", get(handlers::get_scrape))
        .route("/crawl", post(handlers::start_crawl))
        .route("/crawl/{id}", get(handlers::get_crawl).delete(handlers::cancel_crawl))
        .route("/crawl/{id}/errors", get(handlers::get_crawl_errors))
        .route("/crawl/ongoing", get(handlers::get_ongoing_crawls))
        .route("/batch/scrape", post(handlers::batch_scrape))
        .route("/map", post(handlers::map))
        .route("/search", post(handlers::search))
        .route("/extract", post(handlers::start_extract))
        .route("/extract/{id}", get(handlers::get_extract))
        .route("/team/credit-usage", get(handlers::credit_usage))
        .route("/team/token-usage", get(handlers::token_usage))
        .route("/team/concurrency-check", get(handlers::concurrency_check));

    Router::new()
        .nest("/v1", versioned.clone())
        .nest("/v2", versioned)
        .route("/health", get(|| async { "ok" }))
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
