//! Concurrency Governor: a per-team cap on in-flight scrape jobs.
//!
//! Grounded on the browser pool's acquire/release/RAII-guard shape: a
//! resource handed out under a capacity ceiling, released automatically on
//! `Drop`, with callers over the cap queued instead of rejected. Here the
//! "resource" is a lease slot rather than a browser instance, tracked per
//! team as a sorted set of `(jobId, expiry)` with a FIFO waitlist.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::domain::TeamId;

struct Waiter {
    job_id: Uuid,
    ttl: Duration,
    responder: oneshot::Sender<Lease>,
}

struct TeamGovernorInner {
    /// Active members: jobId -> lease expiry. A `BTreeMap` keyed by expiry
    /// would collide on equal timestamps, so this keeps expiry as the value
    /// and scans for expired members on acquire, mirroring the pool's
    /// linear health-check-before-handout scan.
    active: BTreeMap<Uuid, Instant>,
    waitlist: VecDeque<Waiter>,
    cap: usize,
}

struct TeamGovernor {
    inner: Mutex<TeamGovernorInner>,
    in_use: AtomicUsize,
}

pub struct Lease {
    team: TeamId,
    job_id: Uuid,
    governor: Arc<ConcurrencyGovernor>,
    released: bool,
}

impl Lease {
    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.released {
            self.governor.release_sync(self.team, self.job_id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Leased,
    Queued,
}

pub struct ConcurrencyGovernor {
    teams: DashMap<TeamId, Arc<TeamGovernor>>,
}

impl Default for ConcurrencyGovernor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyGovernor {
    #[must_use]
    pub fn new() -> Self {
        Self { teams: DashMap::new() }
    }

    fn governor_for(&self, team: TeamId, cap: usize) -> Arc<TeamGovernor> {
        self.teams
            .entry(team)
            .or_insert_with(|| {
                Arc::new(TeamGovernor {
                    inner: Mutex::new(TeamGovernorInner {
                        active: BTreeMap::new(),
                        waitlist: VecDeque::new(),
                        cap,
                    }),
                    in_use: AtomicUsize::new(0),
                })
            })
            .clone()
    }

    /// `acquire(team, jobId, ttl) -> lease | queued`. `cap` narrows the
    /// team's configured `concurrencyMax` for a single crawl/batch via
    /// `min(requested, team.concurrencyMax)`.
    pub async fn acquire(self: &Arc<Self>, team: TeamId, job_id: Uuid, ttl: Duration, cap: usize) -> Lease {
        let governor = self.governor_for(team, cap);

        let rx = {
            let mut inner = governor.inner.lock().await;
            inner.cap = cap;
            evict_expired(&mut inner.active);

            if inner.active.len() < inner.cap {
                inner.active.insert(job_id, Instant::now() + ttl);
                governor.in_use.fetch_add(1, Ordering::Relaxed);
                return Lease {
                    team,
                    job_id,
                    governor: Arc::clone(self),
                    released: false,
                };
            }

            let (tx, rx) = oneshot::channel();
            inner.waitlist.push_back(Waiter {
                job_id,
                ttl,
                responder: tx,
            });
            rx
        };

        rx.await.unwrap_or(Lease {
            team,
            job_id,
            governor: Arc::clone(self),
            released: true,
        })
    }

    pub async fn release(self: &Arc<Self>, team: TeamId, job_id: Uuid) {
        let Some(governor) = self.teams.get(&team).map(|g| g.clone()) else {
            return;
        };

        let mut inner = governor.inner.lock().await;
        if inner.active.remove(&job_id).is_some() {
            governor.in_use.fetch_sub(1, Ordering::Relaxed);
        }
        evict_expired(&mut inner.active);

        while inner.active.len() < inner.cap {
            let Some(waiter) = inner.waitlist.pop_front() else {
                break;
            };
            inner.active.insert(waiter.job_id, Instant::now() + waiter.ttl);
            governor.in_use.fetch_add(1, Ordering::Relaxed);
            let _ = waiter.responder.send(Lease {
                team,
                job_id: waiter.job_id,
                governor: Arc::clone(self),
                released: false,
            });
        }
    }

    fn release_sync(self: &Arc<Self>, team: TeamId, job_id: Uuid) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.release(team, job_id).await;
        });
    }

    #[must_use]
    pub fn in_flight(&self, team: TeamId) -> usize {
        self.teams.get(&team).map(|g| g.in_use.load(Ordering::Relaxed)).unwrap_or(0)
    }
}

fn evict_expired(active: &mut BTreeMap<Uuid, Instant>) {
    let now = Instant::now();
    active.retain(|_, expiry| *expiry > now);
}
