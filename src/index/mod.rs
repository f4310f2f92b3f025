//! Result Index: a content-addressed cache of prior scrape results keyed by
//! `(urlKey, fingerprint)`, backed by SQLite (WAL mode) with an in-process
//! LRU read-through cache — the same persistence shape the teacher's link
//! index uses for its page/path tables.

mod fingerprint;
mod normalize;
mod store;

pub use fingerprint::{fingerprint, FingerprintInput};
pub use normalize::normalize_for_index;
pub use store::ResultIndex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CacheState, Document};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub url_key: String,
    pub fingerprint: String,
    pub document: Document,
    pub stored_at: DateTime<Utc>,
    pub ttl_hint: Option<chrono::Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(Document),
    Miss,
}

impl Lookup {
    #[must_use]
    pub fn cache_state(&self) -> CacheState {
        match self {
            Lookup::Hit(_) => CacheState::Hit,
            Lookup::Miss => CacheState::Miss,
        }
    }
}
