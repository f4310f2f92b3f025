use std::sync::Arc;
use std::time::Duration;

use scrapeforge_core::adapters::mock::{MockAccounts, MockKv};
use scrapeforge_core::billing::BillingBatcher;
use scrapeforge_core::domain::{Auc, BillingOperation, Credential, TeamId};
use uuid::Uuid;

fn registered_team(accounts: &MockAccounts) -> (TeamId, Credential) {
    let team = TeamId(Uuid::new_v4());
    let credential = Credential(Uuid::new_v4().to_string());
    accounts.register(credential.clone(), Auc::preview(team));
    (team, credential)
}

#[tokio::test]
async fn flush_by_size_commits_credits_to_accounts() {
    let accounts = Arc::new(MockAccounts::new());
    let kv = Arc::new(MockKv::new());
    let (team, _credential) = registered_team(&accounts);

    let batcher = BillingBatcher::spawn(
        accounts.clone(),
        kv.clone(),
        None,
        None,
        2, // batch_size
        Duration::from_secs(3600),
        Duration::from_secs(30),
    );

    batcher.queue_op(BillingOperation::new(team, 1.0, None, false)).await;
    batcher.queue_op(BillingOperation::new(team, 1.0, None, false)).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(accounts.total_billed(team, false), 2.0);
}

#[tokio::test]
async fn flush_groups_additively_by_team_and_extract_flag() {
    let accounts = Arc::new(MockAccounts::new());
    let kv = Arc::new(MockKv::new());
    let (team, _credential) = registered_team(&accounts);

    let batcher = BillingBatcher::spawn(accounts.clone(), kv.clone(), None, None, 100, Duration::from_millis(20), Duration::from_secs(30));

    batcher.queue_op(BillingOperation::new(team, 0.5, None, true)).await;
    batcher.queue_op(BillingOperation::new(team, 0.25, None, true)).await;
    batcher.queue_op(BillingOperation::new(team, 1.0, None, false)).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(accounts.total_billed(team, true), 0.75);
    assert_eq!(accounts.total_billed(team, false), 1.0);
}

#[tokio::test]
async fn pending_reflects_queued_but_unflushed_ops() {
    let accounts = Arc::new(MockAccounts::new());
    let kv = Arc::new(MockKv::new());
    let (team, _credential) = registered_team(&accounts);

    let batcher = BillingBatcher::spawn(accounts.clone(), kv.clone(), None, None, 1000, Duration::from_secs(3600), Duration::from_secs(30));
    batcher.queue_op(BillingOperation::new(team, 1.0, None, false)).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(batcher.pending() > 0 || accounts.total_billed(team, false) > 0.0);
}
