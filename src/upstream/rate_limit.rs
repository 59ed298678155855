//! Per-host token-bucket rate limiting with a minimum inter-request spacing
//! (spec.md §4.1).

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub const MAX_REQUESTS_PER_MINUTE: u32 = 30;
pub const MIN_SPACING: Duration = Duration::from_secs(2);
pub const MAX_BATCH_ITEMS: usize = 100;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    last_request: Option<Instant>,
}

/// A single host's token bucket. Refills continuously at
/// `MAX_REQUESTS_PER_MINUTE / 60` tokens per second, capped at the ceiling.
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: MAX_REQUESTS_PER_MINUTE as f64,
                last_refill: Instant::now(),
                last_request: None,
            }),
        }
    }

    /// Block (honoring cancellation via the caller's own `select!`) until a
    /// token and the minimum spacing are both satisfied, then consume one
    /// token. Returns the duration the caller should sleep before issuing
    /// the request; a zero duration means "go now".
    pub fn acquire_wait(&self) -> Duration {
        let mut state = self.state.lock();
        let now = Instant::now();

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refill_rate = MAX_REQUESTS_PER_MINUTE as f64 / 60.0;
        state.tokens = (state.tokens + elapsed * refill_rate).min(MAX_REQUESTS_PER_MINUTE as f64);
        state.last_refill = now;

        let mut wait = Duration::ZERO;
        if state.tokens < 1.0 {
            let deficit = 1.0 - state.tokens;
            wait = Duration::from_secs_f64(deficit / refill_rate);
        }
        if let Some(last) = state.last_request {
            let since_last = now.duration_since(last);
            if since_last < MIN_SPACING {
                wait = wait.max(MIN_SPACING - since_last);
            }
        }

        state.tokens = (state.tokens - 1.0).max(0.0);
        state.last_request = Some(now + wait);
        wait
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_needs_no_wait() {
        let bucket = TokenBucket::new();
        assert_eq!(bucket.acquire_wait(), Duration::ZERO);
    }

    #[test]
    fn second_immediate_request_waits_for_spacing() {
        let bucket = TokenBucket::new();
        bucket.acquire_wait();
        let wait = bucket.acquire_wait();
        assert!(wait >= Duration::from_millis(100));
    }
}
