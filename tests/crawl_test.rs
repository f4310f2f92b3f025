use std::sync::Arc;
use std::time::Duration;

use scrapeforge_core::adapters::mock::{MockRobots, MockSitemap};
use scrapeforge_core::crawl::CrawlEngine;
use scrapeforge_core::domain::{CrawlOptions, CrawlState, ScrapeJobOptions, TeamId};
use scrapeforge_core::queue::JobQueue;
use uuid::Uuid;

async fn engine(robots: Arc<MockRobots>, sitemap: Arc<MockSitemap>) -> CrawlEngine {
    let queue = Arc::new(JobQueue::open("sqlite::memory:", Duration::from_secs(60), 3, (4, 2, 1)).await.unwrap());
    CrawlEngine::new(queue, robots, sitemap, None, "scrapeforge-test/0.1".to_string())
}

#[tokio::test]
async fn start_seeds_the_frontier_with_seed_and_sitemap_urls() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()]));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let crawl = engine
        .start(team, 10, "https://example.com", CrawlOptions::default(), ScrapeJobOptions::default(), None, false)
        .await
        .unwrap();

    assert_eq!(crawl.state, CrawlState::Scraping);
    assert!(crawl.discovered.len() >= 2);
}

#[tokio::test]
async fn robots_denied_seed_is_recorded_and_not_admitted() {
    let robots = Arc::new(MockRobots::new());
    robots.deny("https://blocked.example.com/");
    let sitemap = Arc::new(MockSitemap::new(Vec::new()));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let crawl = engine
        .start(team, 10, "https://blocked.example.com/", CrawlOptions::default(), ScrapeJobOptions::default(), None, false)
        .await
        .unwrap();

    assert_eq!(crawl.robots_blocked, vec!["https://blocked.example.com/".to_string()]);
}

#[tokio::test]
async fn cancel_tombstones_the_crawl_and_cascades_to_queued_children() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(vec!["https://example.com/a".to_string()]));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let crawl = engine
        .start(team, 10, "https://example.com", CrawlOptions::default(), ScrapeJobOptions::default(), None, false)
        .await
        .unwrap();

    engine.cancel(team, crawl.id).await.unwrap();
    let cancelled = engine.get(team, crawl.id).await.unwrap();
    assert_eq!(cancelled.state, CrawlState::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_crawl_id_returns_not_found() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(Vec::new()));
    let engine = engine(robots, sitemap).await;

    let err = engine.cancel(TeamId(Uuid::new_v4()), Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn map_returns_discovered_urls_without_enqueueing_scrape_jobs() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(vec!["https://example.com/a".to_string()]));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let discovered = engine.map(team, 10, "https://example.com", CrawlOptions::default()).await.unwrap();
    assert!(discovered.iter().any(|u| u.contains("example.com")));
}

#[tokio::test]
async fn start_batch_enqueues_every_url_as_a_batch_child() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(Vec::new()));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let urls = vec!["https://example.com/1".to_string(), "https://example.com/2".to_string()];
    let crawl = engine.start_batch(team, 10, urls.clone(), ScrapeJobOptions::default(), None).await.unwrap();

    assert_eq!(crawl.discovered.len(), urls.len());
}

#[tokio::test]
async fn seed_url_exceeding_max_depth_is_rejected() {
    let robots = Arc::new(MockRobots::new());
    let sitemap = Arc::new(MockSitemap::new(Vec::new()));
    let engine = engine(robots, sitemap).await;
    let team = TeamId(Uuid::new_v4());

    let options = CrawlOptions {
        max_depth: Some(0),
        ..Default::default()
    };
    let err = engine
        .start(team, 10, "https://example.com/a/b/c", options, ScrapeJobOptions::default(), None, false)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}
