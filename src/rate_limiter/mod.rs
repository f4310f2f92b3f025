//! Per-`(team, operation)` sliding-window rate limiter.
//!
//! Grounded on the crawl engine's lock-free per-domain token bucket: state is
//! packed into a single `AtomicU64` pair `(tokens_scaled, last_refill_ms)`
//! per key, updated via a compare-and-swap retry loop so concurrent callers
//! never block each other, generalized here from a per-domain key to an
//! arbitrary caller-supplied key (`"{team}:{op}"` or, for preview
//! credentials, `"{ip}:{credential}"`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Fixed-point scale applied to token counts so fractional refill amounts
/// survive integer atomics.
const TOKEN_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    Allow { remaining: u32 },
    Deny { retry_after_ms: u64, remaining: u32 },
}

struct Bucket {
    /// High 32 bits: tokens remaining (scaled). Low 32 bits: milliseconds
    /// since `base_time` at last refill.
    state: AtomicU64,
    capacity_scaled: u64,
    refill_per_ms: f64,
}

impl Bucket {
    fn new(capacity: u32, window: Duration, base_time: Instant) -> Self {
        let capacity_scaled = (capacity as f64 * TOKEN_SCALE) as u64;
        let refill_per_ms = capacity_scaled as f64 / window.as_millis().max(1) as f64;
        let now_ms = instant_ms(base_time, Instant::now());
        Self {
            state: AtomicU64::new(pack(capacity_scaled, now_ms)),
            capacity_scaled,
            refill_per_ms,
        }
    }

    fn try_consume(&self, base_time: Instant, cost: u64) -> (bool, u64) {
        loop {
            let now_ms = instant_ms(base_time, Instant::now());
            let current = self.state.load(Ordering::Acquire);
            let (tokens, last_ms) = unpack(current);

            let elapsed_ms = now_ms.saturating_sub(last_ms) as f64;
            let refilled = (elapsed_ms * self.refill_per_ms) as u64;
            let tokens = (tokens.saturating_add(refilled)).min(self.capacity_scaled);

            let cost_scaled = cost * TOKEN_SCALE as u64;
            if tokens < cost_scaled {
                let deficit = cost_scaled - tokens;
                let ms_needed = (deficit as f64 / self.refill_per_ms).ceil() as u64;
                return (false, ms_needed);
            }

            let new_tokens = tokens - cost_scaled;
            let new_state = pack(new_tokens, now_ms);
            if self
                .state
                .compare_exchange_weak(current, new_state, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return (true, new_tokens / TOKEN_SCALE as u64);
            }
            std::hint::spin_loop();
        }
    }
}

fn pack(tokens_scaled: u64, last_ms: u64) -> u64 {
    (tokens_scaled << 32) | (last_ms & 0xFFFF_FFFF)
}

fn unpack(state: u64) -> (u64, u64) {
    (state >> 32, state & 0xFFFF_FFFF)
}

fn instant_ms(base: Instant, t: Instant) -> u64 {
    t.saturating_duration_since(base).as_millis() as u64
}

pub struct RateLimiter {
    buckets: DashMap<String, Arc<Bucket>>,
    window: Duration,
    base_time: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            window,
            base_time: Instant::now(),
        }
    }

    /// `admit(key, limit) -> Allow | Deny(retryAfter, consumed, remaining)`
    #[must_use]
    pub fn admit(&self, key: &str, limit_per_window: u32) -> RateLimitDecision {
        let bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Bucket::new(limit_per_window, self.window, self.base_time)))
            .clone();

        let (allowed, remaining) = bucket.try_consume(self.base_time, 1);
        if allowed {
            RateLimitDecision::Allow {
                remaining: remaining as u32,
            }
        } else {
            RateLimitDecision::Deny {
                retry_after_ms: remaining,
                remaining: 0,
            }
        }
    }

    pub fn clear(&self, key: &str) {
        self.buckets.remove(key);
    }

    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.buckets.len()
    }
}

#[must_use]
pub fn team_op_key(team: &str, op: &str) -> String {
    format!("{team}:{op}")
}

#[must_use]
pub fn preview_key(ip: &str, credential: &str) -> String {
    format!("{ip}:{credential}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for _ in 0..5 {
            assert!(matches!(limiter.admit("team1:scrape", 5), RateLimitDecision::Allow { .. }));
        }
        let decision = limiter.admit("team1:scrape", 5);
        assert!(matches!(decision, RateLimitDecision::Deny { .. }));
        if let RateLimitDecision::Deny { retry_after_ms, remaining } = decision {
            assert!(retry_after_ms > 0);
            assert_eq!(remaining, 0);
        }
    }

    #[test]
    fn isolated_per_key() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        for _ in 0..3 {
            limiter.admit("team1:scrape", 3);
        }
        assert!(matches!(limiter.admit("team2:scrape", 3), RateLimitDecision::Allow { .. }));
    }
}
