use std::sync::Arc;
use std::time::Duration;

use scrapeforge_core::adapters::mock::MockBlobStore;
use scrapeforge_core::domain::TeamId;
use scrapeforge_core::zdr::{JobLogEntry, JobLogStore};
use uuid::Uuid;

fn base_entry(job_id: Uuid, team_id: TeamId, zdr: bool) -> JobLogEntry {
    JobLogEntry {
        job_id,
        team_id,
        crawl_id: None,
        url: Some("https://example.com/secret".to_string()),
        page_options: Some("{\"formats\":[\"markdown\"]}".to_string()),
        crawler_options: None,
        success: true,
        message: None,
        num_docs: 1,
        time_taken_ms: 42,
        tokens_billed: 1.0,
        zdr,
        request_scoped_zdr: false,
    }
}

#[tokio::test]
async fn non_zdr_job_preserves_url_for_status_lookup() {
    let store = JobLogStore::open("sqlite::memory:").await.unwrap();
    let team = TeamId(Uuid::new_v4());
    let job_id = Uuid::new_v4();
    store.record(&base_entry(job_id, team, false), Duration::from_secs(60)).await.unwrap();

    let row = store.lookup_for_status(job_id).await.unwrap().expect("row should exist");
    assert_eq!(row.url.as_deref(), Some("https://example.com/secret"));
}

#[tokio::test]
async fn zdr_job_redacts_url_at_write_time() {
    let store = JobLogStore::open("sqlite::memory:").await.unwrap();
    let team = TeamId(Uuid::new_v4());
    let job_id = Uuid::new_v4();
    store.record(&base_entry(job_id, team, true), Duration::from_secs(60)).await.unwrap();

    let row = store.lookup_for_status(job_id).await.unwrap().expect("row should exist");
    assert!(row.url.is_none());
}

#[tokio::test]
async fn completed_request_scoped_zdr_job_disappears_from_status_lookup() {
    let store = JobLogStore::open("sqlite::memory:").await.unwrap();
    let team = TeamId(Uuid::new_v4());
    let job_id = Uuid::new_v4();
    let mut entry = base_entry(job_id, team, false);
    entry.request_scoped_zdr = true;
    entry.success = true;
    store.record(&entry, Duration::from_secs(60)).await.unwrap();

    assert!(store.lookup_for_status(job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_request_scoped_zdr_job_is_still_visible() {
    let store = JobLogStore::open("sqlite::memory:").await.unwrap();
    let team = TeamId(Uuid::new_v4());
    let job_id = Uuid::new_v4();
    let mut entry = base_entry(job_id, team, false);
    entry.request_scoped_zdr = true;
    entry.success = false;
    store.record(&entry, Duration::from_secs(60)).await.unwrap();

    assert!(store.lookup_for_status(job_id).await.unwrap().is_some());
}

#[tokio::test]
async fn job_ids_for_crawl_filters_by_success_when_requested() {
    let store = JobLogStore::open("sqlite::memory:").await.unwrap();
    let team = TeamId(Uuid::new_v4());
    let crawl_id = Uuid::new_v4();

    let ok_job = Uuid::new_v4();
    let mut ok_entry = base_entry(ok_job, team, false);
    ok_entry.crawl_id = Some(crawl_id);
    ok_entry.success = true;
    store.record(&ok_entry, Duration::from_secs(60)).await.unwrap();

    let failed_job = Uuid::new_v4();
    let mut failed_entry = base_entry(failed_job, team, false);
    failed_entry.crawl_id = Some(crawl_id);
    failed_entry.success = false;
    store.record(&failed_entry, Duration::from_secs(60)).await.unwrap();

    let successes = store.job_ids_for_crawl(crawl_id, true).await.unwrap();
    assert_eq!(successes, vec![ok_job]);

    let mut all = store.job_ids_for_crawl(crawl_id, false).await.unwrap();
    all.sort();
    let mut expected = vec![ok_job, failed_job];
    expected.sort();
    assert_eq!(all, expected);
}

#[tokio::test]
async fn zdr_sweeper_deletes_blob_once_lookback_elapses() {
    let store = Arc::new(JobLogStore::open("sqlite::memory:").await.unwrap());
    let blob_store = Arc::new(MockBlobStore::new());
    let job_id = Uuid::new_v4();
    blob_store.put(&job_id.to_string(), b"redacted payload".to_vec(), "text/html").await.unwrap();

    let mut entry = base_entry(job_id, TeamId(Uuid::new_v4()), true);
    entry.zdr = true;
    store.record(&entry, Duration::from_millis(1)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let handle = scrapeforge_core::zdr::ZdrCleaner::spawn(
        store.clone(),
        blob_store.clone(),
        None,
        Duration::from_millis(10),
        Duration::from_secs(3600),
    );
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.abort();

    assert!(blob_store.is_empty());
}
