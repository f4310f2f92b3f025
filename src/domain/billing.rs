use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Credential, TeamId};

/// A single metered operation, buffered durably until the billing batcher
/// flushes it to the Accounts ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingOperation {
    pub team_id: TeamId,
    /// Credential the op was billed against, so the AUC cache's optimistic
    /// decrement on flush can target the right cache key.
    pub credential: Option<Credential>,
    pub credits: f64,
    pub subscription_id: Option<String>,
    pub is_extract: bool,
    pub timestamp: DateTime<Utc>,
    pub preview: bool,
}

impl BillingOperation {
    #[must_use]
    pub fn new(team_id: TeamId, credits: f64, subscription_id: Option<String>, is_extract: bool) -> Self {
        Self {
            team_id,
            credential: None,
            credits,
            subscription_id,
            is_extract,
            timestamp: Utc::now(),
            preview: false,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn group_key(&self) -> (TeamId, Option<String>, bool) {
        (self.team_id, self.subscription_id.clone(), self.is_extract)
    }
}
