//! Core domain entities shared across components: `Team`, `Credential`,
//! `Auc`, `ScrapeJob`, `Document`, `Crawl`, `CacheEntry`, `BillingOperation`.

mod auc;
mod billing;
mod crawl;
mod document;
mod job;

pub use auc::{Auc, AucFlags, RateLimitTable};
pub use billing::BillingOperation;
pub use crawl::{Crawl, CrawlError, CrawlOptions, CrawlState};
pub use document::{CacheState, ChangeStatus, ChangeTracking, Document, DocumentFormats, DocumentMetadata};
pub use job::{JobMode, ProxyMode, ScrapeJob, ScrapeJobOptions, ScrapeJobState};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity bearing credit balance, plan-level rate limits, max concurrency,
/// and deployment flags. Created and owned by the Accounts collaborator;
/// never destroyed by this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub plan: String,
    pub concurrency_max: usize,
    pub allow_zdr: bool,
    pub force_zdr: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub Uuid);

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token mapping to exactly one team. Revocation is observed via AUC
/// cache invalidation, not by the credential itself changing shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Credential(pub String);

impl Credential {
    /// Credentials are rejected up front unless UUID-shaped.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        Uuid::parse_str(&self.0).is_ok()
    }
}
