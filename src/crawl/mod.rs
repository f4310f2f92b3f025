//! Crawl Engine: per-crawl state machine driving seed resolution, sitemap
//! ingestion, the `admit` filter predicate, and fan-out of child scrape jobs.
//!
//! Grounded on the teacher's `crawl_engine::core`/`crawl_engine::orchestrator`
//! (bounded-concurrency task fan-out over a frontier, circuit-breaker-style
//! domain-health tracking) and `crawl_engine::domain_limiter::DomainLimiter`
//! for the per-crawl concurrency cap. The ongoing-crawl registry generalizes
//! `mcp::registry::CrawlRegistry`.

pub mod admit;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::adapters::{Robots, RobotsDecision, Sitemap};
use crate::domain::{
    Credential, Crawl, CrawlError, CrawlOptions, CrawlState, JobMode, ScrapeJob, ScrapeJobOptions, TeamId,
};
use crate::errors::CoreError;
use crate::events::{CoreEvent, CoreEventBus};
use crate::queue::{JobQueue, PriorityBand};

use admit::{admit as admit_predicate, path_depth, AdmitContext, AdmitDecision};
use registry::CrawlRegistry;

/// Result of seeding or extending a crawl's frontier: how many child jobs
/// were enqueued and how many candidates were rejected by robots.
pub struct AdmitOutcome {
    pub admitted: usize,
    pub robots_blocked: Vec<String>,
}

pub struct CrawlEngine {
    queue: Arc<JobQueue>,
    robots: Arc<dyn Robots>,
    sitemap: Arc<dyn Sitemap>,
    registry: CrawlRegistry,
    event_bus: Option<Arc<CoreEventBus>>,
    user_agent: String,
}

impl CrawlEngine {
    #[must_use]
    pub fn new(
        queue: Arc<JobQueue>,
        robots: Arc<dyn Robots>,
        sitemap: Arc<dyn Sitemap>,
        event_bus: Option<Arc<CoreEventBus>>,
        user_agent: String,
    ) -> Self {
        Self {
            queue,
            robots,
            sitemap,
            registry: CrawlRegistry::new(),
            event_bus,
            user_agent,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CrawlRegistry {
        &self.registry
    }

    /// `init`: validates the seed, resolves robots + sitemap, seeds the
    /// frontier, and registers the crawl. Returns the crawl's snapshot
    /// (its `id` is what the orchestrator hands back to the caller).
    pub async fn start(
        &self,
        team_id: TeamId,
        team_concurrency_max: usize,
        seed_url: &str,
        options: CrawlOptions,
        scrape_options: ScrapeJobOptions,
        credential: Option<Credential>,
        discovery_only: bool,
    ) -> Result<Crawl, CoreError> {
        let parsed_seed =
            Url::parse(seed_url).map_err(|_| CoreError::Validation("seed url is not absolute http(s)".to_string()))?;
        if parsed_seed.scheme() != "http" && parsed_seed.scheme() != "https" {
            return Err(CoreError::Validation("seed url is not absolute http(s)".to_string()));
        }

        let seed_depth = path_depth(&parsed_seed);
        if let Some(max_depth) = options.max_depth {
            if seed_depth > max_depth as usize {
                return Err(CoreError::Validation(
                    "seed url path depth exceeds maxDepth".to_string(),
                ));
            }
        }

        let (robots_decision, robots_crawl_delay) = self
            .robots
            .is_allowed(seed_url, &self.user_agent)
            .await
            .unwrap_or((RobotsDecision::Allowed, None));

        let mut crawl = Crawl::new(team_id, crate::index::normalize_for_index(seed_url), options.clone(), seed_depth);
        let user_delay_secs = options.delay_ms.map(|ms| ms as f64 / 1000.0);
        crawl.crawl_delay_secs = match (user_delay_secs, robots_crawl_delay) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        if !options.ignore_robots_txt && robots_decision == RobotsDecision::Denied {
            crawl.robots_blocked.push(seed_url.to_string());
        }

        let sitemap_urls = if options.ignore_sitemap {
            Vec::new()
        } else {
            self.sitemap.list(seed_url).await.unwrap_or_default()
        };

        crawl.concurrency_cap = options.max_concurrency.unwrap_or(team_concurrency_max).min(team_concurrency_max);

        self.event_bus.as_ref().inspect(|bus| bus.publish(CoreEvent::CrawlStarted { crawl_id: crawl.id }));

        let handle = self.registry.insert(crawl).await;

        // Seed the frontier: the seed URL itself, plus any sitemap URLs
        // (sitemap entries bypass the discovery-depth check per §4.7).
        let mut candidates = vec![(seed_url.to_string(), false)];
        candidates.extend(sitemap_urls.into_iter().map(|u| (u, true)));

        let priority = if discovery_only { PriorityBand::Background } else { PriorityBand::Crawl };
        self.admit_and_enqueue(&handle, candidates, 0, priority, &scrape_options, credential, discovery_only)
            .await?;

        let crawl = handle.lock().await.clone();
        Ok(crawl)
    }

    /// Runs the seven-check `admit` predicate over `candidates` and enqueues
    /// every admitted URL as a crawl-tagged child job (unless
    /// `discovery_only`, in which case admitted URLs are recorded in
    /// `discovered` only — the degenerate "map" operation).
    async fn admit_and_enqueue(
        &self,
        handle: &Arc<tokio::sync::Mutex<Crawl>>,
        candidates: Vec<(String, bool)>,
        introduced_depth: usize,
        priority: PriorityBand,
        scrape_options: &ScrapeJobOptions,
        credential: Option<Credential>,
        discovery_only: bool,
    ) -> Result<AdmitOutcome, CoreError> {
        let mut crawl = handle.lock().await;
        if crawl.state == CrawlState::Cancelled {
            return Ok(AdmitOutcome { admitted: 0, robots_blocked: Vec::new() });
        }

        let include_re = compile_patterns(&crawl.options.include_paths);
        let exclude_re = compile_patterns(&crawl.options.exclude_paths);
        let seed_url = Url::parse(&crawl.seed_url).map_err(|e| CoreError::Other(e.into()))?;
        let options = crawl.options.clone();
        let seed_depth = crawl.seed_depth;
        let team_id = crawl.team_id;
        let crawl_id = crawl.id;
        let zdr = crawl.zdr;
        let concurrency_cap = crawl.concurrency_cap;

        let mut newly_admitted = Vec::new();
        let mut robots_blocked = Vec::new();

        for (candidate, is_sitemap_url) in candidates {
            let normalized = crate::index::normalize_for_index(&candidate);

            let ctx = AdmitContext {
                seed_url: &seed_url,
                seed_depth,
                options: &options,
                discovered: &crawl.discovered,
                is_sitemap_url,
                introduced_depth,
            };

            let robots_denied = if options.ignore_robots_txt {
                false
            } else {
                matches!(
                    self.robots.is_allowed(&candidate, &self.user_agent).await,
                    Ok((RobotsDecision::Denied, _))
                )
            };

            let decision = admit_predicate(&candidate, &normalized, &ctx, robots_denied, &include_re, &exclude_re);
            match decision {
                AdmitDecision::Admit => {
                    crawl.discovered.insert(normalized.clone());
                    newly_admitted.push(candidate);
                }
                AdmitDecision::RejectRobots => {
                    crawl.robots_blocked.push(candidate.clone());
                    robots_blocked.push(candidate);
                }
                _ => {}
            }

            if let Some(limit) = options.limit {
                if crawl.discovered.len() >= limit {
                    break;
                }
            }
        }
        drop(crawl);

        if !discovery_only {
            let delay = handle.lock().await.crawl_delay_secs;
            // Crawl children always request `links`, regardless of the
            // caller's requested formats, so the worker can feed freshly
            // discovered links back into this crawl's frontier.
            let mut child_options = scrape_options.clone();
            if !child_options.formats.iter().any(|f| f == "links") {
                child_options.formats.push("links".to_string());
            }
            for (i, url) in newly_admitted.iter().enumerate() {
                let mut job = ScrapeJob::new(team_id, url.clone(), child_options.clone(), JobMode::CrawlChild);
                job.crawl_id = Some(crawl_id);
                job.zdr = zdr || job.zdr;
                job.concurrency_cap = concurrency_cap;
                if let Some(credential) = &credential {
                    job = job.with_credential(credential.clone());
                }
                let stagger = delay.map(|secs| Duration::from_secs_f64(secs * i as f64));
                self.queue.enqueue(&job, priority, stagger).await.map_err(CoreError::Other)?;

                if let Some(bus) = &self.event_bus {
                    bus.publish(CoreEvent::CrawlUrlAdmitted { crawl_id, url: url.clone() });
                }
            }
        }

        for url in &robots_blocked {
            if let Some(bus) = &self.event_bus {
                bus.publish(CoreEvent::CrawlUrlBlockedByRobots { crawl_id, url: url.clone() });
            }
        }

        Ok(AdmitOutcome { admitted: newly_admitted.len(), robots_blocked })
    }

    /// Called by the worker-driving loop once a crawl child job completes
    /// (successfully or not), reporting any links discovered for
    /// further fan-out and advancing completion bookkeeping.
    pub async fn on_child_finished(
        &self,
        team_id: TeamId,
        crawl_id: Uuid,
        success: bool,
        error: Option<CrawlError>,
        discovered_links: Vec<String>,
        scrape_options: &ScrapeJobOptions,
        credential: Option<Credential>,
    ) -> Result<(), CoreError> {
        let Some(handle) = self.registry.get(team_id, crawl_id).await else {
            return Ok(());
        };

        {
            let mut crawl = handle.lock().await;
            if success {
                crawl.completed += 1;
            } else {
                crawl.failed += 1;
                if let Some(err) = error {
                    crawl.errors.push(err);
                }
            }
        }

        if !discovered_links.is_empty() {
            let depth = {
                let crawl = handle.lock().await;
                crawl.seed_depth + 1
            };
            let candidates = discovered_links.into_iter().map(|u| (u, false)).collect();
            self.admit_and_enqueue(&handle, candidates, depth, PriorityBand::Crawl, scrape_options, credential, false)
                .await?;
        }

        self.maybe_complete(team_id, crawl_id).await;
        Ok(())
    }

    async fn maybe_complete(&self, team_id: TeamId, crawl_id: Uuid) {
        let Some(handle) = self.registry.get(team_id, crawl_id).await else {
            return;
        };
        let mut crawl = handle.lock().await;
        if crawl.is_complete(0, true) {
            crawl.state = CrawlState::Completed;
            if let Some(bus) = &self.event_bus {
                bus.publish(CoreEvent::CrawlCompleted { crawl_id, completed: crawl.completed });
            }
        }
    }

    /// `DELETE /v<n>/crawl/:id`: tombstones the crawl and cascades
    /// cancellation onto every queued/active child job.
    pub async fn cancel(&self, team_id: TeamId, crawl_id: Uuid) -> Result<(), CoreError> {
        let Some(handle) = self.registry.get(team_id, crawl_id).await else {
            return Err(CoreError::NotFound("crawl not found".to_string()));
        };
        handle.lock().await.state = CrawlState::Cancelled;
        self.queue.cancel_by_crawl(crawl_id).await.map_err(CoreError::Other)?;

        if let Some(bus) = &self.event_bus {
            bus.publish(CoreEvent::CrawlCancelled { crawl_id });
        }
        Ok(())
    }

    pub async fn get(&self, team_id: TeamId, crawl_id: Uuid) -> Option<Crawl> {
        let handle = self.registry.get(team_id, crawl_id).await?;
        Some(handle.lock().await.clone())
    }

    pub async fn ongoing(&self, team_id: TeamId) -> Vec<Crawl> {
        let mut out = Vec::new();
        for handle in self.registry.ongoing_for_team(team_id).await {
            out.push(handle.lock().await.clone());
        }
        out
    }

    /// Degenerate discovery-only crawl: returns the discovered URL set
    /// without enqueueing any scrape jobs.
    pub async fn map(
        &self,
        team_id: TeamId,
        team_concurrency_max: usize,
        seed_url: &str,
        options: CrawlOptions,
    ) -> Result<Vec<String>, CoreError> {
        let crawl = self
            .start(
                team_id,
                team_concurrency_max,
                seed_url,
                options,
                ScrapeJobOptions::default(),
                None,
                true,
            )
            .await?;
        self.registry.remove(team_id, crawl.id).await;
        Ok(crawl.discovered.into_iter().collect())
    }

    /// `POST /v<n>/batch/scrape`: enqueues every URL directly as a
    /// `BatchChild` job under a single crawl record, bypassing `admit` —
    /// batch URLs are caller-supplied, not discovered, so scope/robots/depth
    /// filtering doesn't apply.
    pub async fn start_batch(
        &self,
        team_id: TeamId,
        team_concurrency_max: usize,
        urls: Vec<String>,
        scrape_options: ScrapeJobOptions,
        credential: Option<Credential>,
    ) -> Result<Crawl, CoreError> {
        let seed = urls.first().cloned().unwrap_or_default();
        let mut crawl = Crawl::new(team_id, seed, CrawlOptions::default(), 0);
        crawl.discovered = urls.iter().cloned().collect();
        crawl.concurrency_cap = team_concurrency_max;
        let crawl_id = crawl.id;

        self.event_bus.as_ref().inspect(|bus| bus.publish(CoreEvent::CrawlStarted { crawl_id }));
        let handle = self.registry.insert(crawl).await;

        for url in &urls {
            let mut job = ScrapeJob::new(team_id, url.clone(), scrape_options.clone(), JobMode::BatchChild);
            job.crawl_id = Some(crawl_id);
            job.concurrency_cap = team_concurrency_max;
            if let Some(credential) = &credential {
                job = job.with_credential(credential.clone());
            }
            self.queue.enqueue(&job, PriorityBand::Realtime, None).await.map_err(CoreError::Other)?;
        }

        Ok(handle.lock().await.clone())
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}
