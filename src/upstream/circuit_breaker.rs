//! Per-host circuit breaker (spec.md §4.1).
//!
//! Opens after 5 consecutive non-rate-limit failures; stays open for 5
//! minutes, failing fast; then allows exactly one probe call. Rate-limit
//! responses never open the breaker and never count as a failure here —
//! they're handled entirely by the retry/backoff loop in `client.rs`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

const FAILURE_THRESHOLD: u32 = 5;
const OPEN_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Call is allowed to proceed normally.
    Allow,
    /// Call is allowed, but it is the single probe for a half-open breaker;
    /// its outcome decides whether the breaker closes or reopens.
    Probe,
    /// Breaker is open; fail fast without attempting the call.
    Reject,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed => Admission::Allow,
            State::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= OPEN_DURATION {
                    inner.state = State::HalfOpen;
                    Admission::Probe
                } else {
                    Admission::Reject
                }
            }
            State::HalfOpen => Admission::Reject,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// A non-rate-limit failure. Opens the breaker at the threshold, or, if
    /// the breaker was half-open (the single probe failed), restarts the
    /// open window.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_failures = FAILURE_THRESHOLD;
            }
            State::Closed | State::Open => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= FAILURE_THRESHOLD {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.lock().state, State::Open)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new();
        for _ in 0..4 {
            cb.record_failure();
            assert_eq!(cb.admit(), Admission::Allow);
        }
        cb.record_failure();
        assert_eq!(cb.admit(), Admission::Reject);
        assert!(cb.is_open());
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new();
        for _ in 0..4 {
            cb.record_failure();
        }
        cb.record_success();
        for _ in 0..4 {
            cb.record_failure();
            assert_eq!(cb.admit(), Admission::Allow);
        }
    }
}
