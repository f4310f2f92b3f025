//! In-memory registry of in-flight crawls keyed by `(team_id, crawl_id)`,
//! generalizing the teacher's connection-isolated `CrawlRegistry` from
//! `(connection_id, crawl_id)` to the multi-tenant `(team_id, crawl_id)`
//! this crate needs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Crawl, TeamId};

type CrawlMap = HashMap<(TeamId, Uuid), Arc<Mutex<Crawl>>>;

#[derive(Clone)]
pub struct CrawlRegistry {
    crawls: Arc<Mutex<CrawlMap>>,
}

impl Default for CrawlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            crawls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, crawl: Crawl) -> Arc<Mutex<Crawl>> {
        let key = (crawl.team_id, crawl.id);
        let handle = Arc::new(Mutex::new(crawl));
        self.crawls.lock().await.insert(key, Arc::clone(&handle));
        handle
    }

    pub async fn get(&self, team_id: TeamId, crawl_id: Uuid) -> Option<Arc<Mutex<Crawl>>> {
        self.crawls.lock().await.get(&(team_id, crawl_id)).cloned()
    }

    pub async fn remove(&self, team_id: TeamId, crawl_id: Uuid) -> Option<Arc<Mutex<Crawl>>> {
        self.crawls.lock().await.remove(&(team_id, crawl_id))
    }

    /// `GET /v<n>/crawl/ongoing`
    pub async fn ongoing_for_team(&self, team_id: TeamId) -> Vec<Arc<Mutex<Crawl>>> {
        self.crawls
            .lock()
            .await
            .iter()
            .filter(|((tid, _), _)| *tid == team_id)
            .map(|(_, handle)| Arc::clone(handle))
            .collect()
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.crawls.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CrawlOptions;

    fn team() -> TeamId {
        TeamId(Uuid::new_v4())
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let registry = CrawlRegistry::new();
        let team_id = team();
        let crawl = Crawl::new(team_id, "https://example.com".to_string(), CrawlOptions::default(), 0);
        let crawl_id = crawl.id;
        registry.insert(crawl).await;

        assert!(registry.get(team_id, crawl_id).await.is_some());
        assert!(registry.get(team(), crawl_id).await.is_none());
    }

    #[tokio::test]
    async fn ongoing_for_team_isolates_other_teams() {
        let registry = CrawlRegistry::new();
        let team_a = team();
        let team_b = team();
        registry
            .insert(Crawl::new(team_a, "https://a.example.com".to_string(), CrawlOptions::default(), 0))
            .await;
        registry
            .insert(Crawl::new(team_b, "https://b.example.com".to_string(), CrawlOptions::default(), 0))
            .await;

        assert_eq!(registry.ongoing_for_team(team_a).await.len(), 1);
        assert_eq!(registry.ongoing_for_team(team_b).await.len(), 1);
    }
}
