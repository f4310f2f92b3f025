use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::TeamId;

/// Snapshot of team identity, plan limits, and live credit state, as
/// returned by the Accounts collaborator and cached by the AUC cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Auc {
    pub team: TeamId,
    pub plan: String,
    pub rate_limits: RateLimitTable,
    pub concurrency_max: usize,
    pub credits_remaining: f64,
    pub flags: AucFlags,
    pub is_extract: bool,
}

impl Auc {
    /// Synthetic AUC for a preview credential, bound to the caller's IP with
    /// fixed low limits. Never originates from an Accounts RPC.
    #[must_use]
    pub fn preview(team: TeamId) -> Self {
        Self {
            team,
            plan: "preview".to_string(),
            rate_limits: RateLimitTable::preview(),
            concurrency_max: 1,
            credits_remaining: 100.0,
            flags: AucFlags::default(),
            is_extract: false,
        }
    }

    /// Synthetic, unlimited AUC used when DB-backed auth is disabled by a
    /// deployment flag.
    #[must_use]
    pub fn bypass(team: TeamId) -> Self {
        Self {
            team,
            plan: "bypass".to_string(),
            rate_limits: RateLimitTable::unlimited(),
            concurrency_max: usize::MAX,
            credits_remaining: f64::MAX,
            flags: AucFlags::default(),
            is_extract: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AucFlags {
    pub allow_zdr: bool,
    pub force_zdr: bool,
}

/// Per-operation request-per-minute limits. Falls back to a built-in table
/// keyed by operation when a plan does not specify one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitTable(pub HashMap<String, u32>);

impl RateLimitTable {
    #[must_use]
    pub fn get(&self, op: &str) -> u32 {
        self.0.get(op).copied().unwrap_or_else(|| default_limit(op))
    }

    fn preview() -> Self {
        Self(HashMap::new())
    }

    fn unlimited() -> Self {
        let mut map = HashMap::new();
        for op in ["scrape", "crawl", "batch", "map", "search", "extract"] {
            map.insert(op.to_string(), u32::MAX);
        }
        Self(map)
    }
}

/// Built-in per-operation fallback when a plan omits a rate limit entry.
#[must_use]
pub fn default_limit(op: &str) -> u32 {
    match op {
        "scrape" => 100,
        "crawl" => 15,
        "batch" => 20,
        "map" => 60,
        "search" => 50,
        "extract" => 10,
        _ => 60,
    }
}
