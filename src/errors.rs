//! Crate-wide error taxonomy.
//!
//! `CoreError` is the boundary error type every public operation returns.
//! `FetchError` classifies adapter-level failures into transient vs
//! permanent so the worker and crawl engine can decide whether to retry,
//! advance a fetcher fallback chain, or fail a job outright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed")]
    Auth,

    #[error("insufficient credits")]
    Billing,

    #[error("not authorized for this operation")]
    Authorization,

    #[error("{0} not found")]
    NotFound(String),

    #[error("operation timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("engine error: {code}")]
    Engine { code: String },

    #[error(transparent)]
    Adapter(#[from] FetchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Auth => 401,
            CoreError::Authorization => 403,
            CoreError::NotFound(_) => 404,
            CoreError::RateLimited { .. } => 429,
            CoreError::Timeout => 408,
            CoreError::Billing => 402,
            CoreError::Engine { .. } | CoreError::Adapter(_) | CoreError::Other(_) => 500,
        }
    }
}

/// Classification of a fetch/adapter failure. Mirrors the error-class table
/// used by the fetcher fallback chain and the job retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("dns resolution failed: {0}")]
    Dns(String),

    #[error("tls/ssl error: {0}")]
    Ssl(String),

    #[error("request timed out")]
    Timeout,

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("upstream returned {status}")]
    Http4xx { status: u16 },

    #[error("upstream returned {status}")]
    Http5xx { status: u16 },

    #[error("engine-specific failure: {0}")]
    EngineSpecific(String),
}

impl FetchError {
    /// Transient failures advance the fetcher fallback chain and are safe to
    /// retry; permanent failures (e.g. a 4xx, an unsupported file type)
    /// should not be retried with the same adapter chain.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Dns(_) | FetchError::Ssl(_) | FetchError::Timeout => true,
            FetchError::Http5xx { .. } | FetchError::EngineSpecific(_) => true,
            FetchError::Http4xx { .. } | FetchError::UnsupportedFile(_) => false,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Dns(_) => "dns",
            FetchError::Ssl(_) => "ssl",
            FetchError::Timeout => "timeout",
            FetchError::UnsupportedFile(_) => "unsupportedFile",
            FetchError::Http4xx { .. } => "http4xx",
            FetchError::Http5xx { .. } => "http5xx",
            FetchError::EngineSpecific(_) => "engineSpecific",
        }
    }
}
