//! Lifecycle event bus: a broadcast channel workers and the crawl engine
//! publish onto, and the orchestrator (or an operator console) can
//! subscribe to for progress/observability. Structure — bounded broadcast
//! channel, pressure/overload accessors, graceful shutdown notify — follows
//! the teacher's `CrawlEventBus`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    JobStarted { job_id: Uuid },
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, message: String },
    CrawlStarted { crawl_id: Uuid },
    CrawlUrlAdmitted { crawl_id: Uuid, url: String },
    CrawlUrlBlockedByRobots { crawl_id: Uuid, url: String },
    CrawlCompleted { crawl_id: Uuid, completed: usize },
    CrawlCancelled { crawl_id: Uuid },
    BillingFlushed { team_ops: usize },
    ZdrSwept { rows: usize },
}

pub struct CoreEventBus {
    sender: broadcast::Sender<CoreEvent>,
    capacity: usize,
    shutdown: Arc<AtomicBool>,
}

impl CoreEventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: CoreEvent) {
        if self.shutdown.load(Ordering::Relaxed) {
            return;
        }
        // broadcast::Sender::send fails only when there are no receivers;
        // that's an expected steady state (no subscriber attached yet).
        let _ = self.sender.send(event);
    }

    #[must_use]
    pub fn pressure(&self) -> f64 {
        self.sender.len() as f64 / self.capacity.max(1) as f64
    }

    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        self.pressure() >= 0.8
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
