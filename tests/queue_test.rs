use std::time::Duration;

use scrapeforge_core::domain::{JobMode, ScrapeJob, ScrapeJobOptions, ScrapeJobState, TeamId};
use scrapeforge_core::queue::{JobQueue, PriorityBand};
use uuid::Uuid;

async fn open_queue() -> JobQueue {
    JobQueue::open(
        "sqlite::memory:",
        Duration::from_secs(60),
        3,
        (4, 2, 1),
    )
    .await
    .unwrap()
}

fn job(team: TeamId, url: &str) -> ScrapeJob {
    ScrapeJob::new(team, url.to_string(), ScrapeJobOptions::default(), JobMode::Single)
}

#[tokio::test]
async fn enqueue_then_reserve_round_trips_the_job() {
    let queue = open_queue().await;
    let team = TeamId(Uuid::new_v4());
    let j = job(team, "https://example.com/a");
    let job_id = queue.enqueue(&j, PriorityBand::Realtime, None).await.unwrap();

    let reserved = queue.reserve().await.unwrap().expect("a job should be reserved");
    assert_eq!(reserved.id, job_id);
    assert_eq!(reserved.url, "https://example.com/a");
}

#[tokio::test]
async fn reserve_on_empty_queue_returns_none() {
    let queue = open_queue().await;
    assert!(queue.reserve().await.unwrap().is_none());
}

#[tokio::test]
async fn delayed_job_is_not_reservable_before_visible_at() {
    let queue = open_queue().await;
    let team = TeamId(Uuid::new_v4());
    let j = job(team, "https://example.com/delayed");
    queue.enqueue(&j, PriorityBand::Background, Some(Duration::from_secs(3600))).await.unwrap();

    assert!(queue.reserve().await.unwrap().is_none());
}

#[tokio::test]
async fn realtime_band_is_preferred_under_contention() {
    let queue = open_queue().await;
    let team = TeamId(Uuid::new_v4());

    queue.enqueue(&job(team, "https://example.com/bg"), PriorityBand::Background, None).await.unwrap();
    queue.enqueue(&job(team, "https://example.com/rt"), PriorityBand::Realtime, None).await.unwrap();

    let mut seen_realtime_first = false;
    for _ in 0..8 {
        if let Some(reserved) = queue.reserve().await.unwrap() {
            if reserved.url == "https://example.com/rt" {
                seen_realtime_first = true;
                break;
            } else {
                // put it back for the next draw by re-enqueuing isn't needed;
                // reserve already consumed it, so just stop once both are drained.
                break;
            }
        }
    }
    assert!(seen_realtime_first, "weighted round-robin should favor the realtime band");
}

#[tokio::test]
async fn reserved_job_state_transitions_to_active() {
    let queue = open_queue().await;
    let team = TeamId(Uuid::new_v4());
    queue.enqueue(&job(team, "https://example.com/state"), PriorityBand::Crawl, None).await.unwrap();

    let reserved = queue.reserve().await.unwrap().unwrap();
    assert_eq!(reserved.state, ScrapeJobState::Active);
}
