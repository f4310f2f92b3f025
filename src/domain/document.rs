use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CacheState {
    Hit,
    Miss,
    Undef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentFormats {
    pub markdown: Option<String>,
    pub raw_html: Option<String>,
    pub links: Option<Vec<String>>,
    pub screenshot: Option<String>,
    pub json: Option<serde_json::Value>,
    pub extract: Option<serde_json::Value>,
    pub summary: Option<String>,
    pub change_tracking: Option<ChangeTracking>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeTracking {
    pub status: ChangeStatus,
    pub diff: Option<String>,
    pub json_diff: Option<serde_json::Value>,
    pub llm_diff: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeStatus {
    New,
    Same,
    Changed,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub proxy_used: String,
    pub cache_state: CacheState,
    pub cached_at: Option<DateTime<Utc>>,
    pub scrape_id: Uuid,
    pub source_url: String,
}

/// Result of a scrape: the bit-exact input `source_url`, the normalized and
/// final (post-redirect) URLs, status, and the formats the caller requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub scrape_id: Uuid,
    pub source_url: String,
    pub normalized_url: String,
    pub final_url: String,
    pub status_code: u16,
    pub formats: DocumentFormats,
    pub metadata: DocumentMetadata,
    pub error: Option<String>,
}

impl Document {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && self.error.is_none()
    }

    /// Only successful scrapes with non-empty content are eligible for the
    /// result index: a 2xx with an empty body is treated as a non-success.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        if !self.is_success() {
            return false;
        }
        let has_content = self.formats.raw_html.as_ref().is_some_and(|h| !h.is_empty())
            || self.formats.markdown.as_ref().is_some_and(|m| !m.is_empty())
            || self.formats.json.is_some()
            || self.formats.screenshot.is_some();
        has_content
    }
}
