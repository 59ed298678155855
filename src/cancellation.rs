//! Deadline-based cancellation (spec.md §5): every dispatcher call accepts
//! an optional deadline, checked at each named suspension point — upstream
//! call, cache refresh, BFS frontier expansion, TSP iteration. No
//! `tokio_util` dependency: a deadline is a plain wall-clock instant,
//! checked cooperatively rather than driving a `CancellationToken`, since
//! nothing here actually needs to interrupt an in-flight future early —
//! the contract is "abort at the next suspension point", not "abort now".

use std::time::{Duration, Instant};

use crate::error::ToolError;

/// An optional wall-clock point past which a call should abort at the next
/// suspension point. `Deadline::none()` never expires, matching every
/// existing caller that doesn't pass one.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(d: Duration) -> Self {
        Self(Some(Instant::now() + d))
    }

    /// Build from a caller-supplied `deadline_ms` (milliseconds from now),
    /// as accepted on every tool action's JSON body.
    pub fn from_millis_from_now(ms: Option<u64>) -> Self {
        match ms {
            Some(ms) => Self::after(Duration::from_millis(ms)),
            None => Self::none(),
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.0, Some(t) if Instant::now() >= t)
    }

    /// Abort with `Cancelled` naming what was in flight if the deadline has
    /// passed (spec.md §5: "identifies what was in flight").
    pub fn check(&self, in_flight: &str) -> Result<(), ToolError> {
        if self.expired() {
            Err(ToolError::cancelled(in_flight))
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_expires() {
        assert!(!Deadline::none().expired());
        assert!(Deadline::none().check("anything").is_ok());
    }

    #[test]
    fn past_deadline_reports_cancelled_with_in_flight_label() {
        let d = Deadline::after(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        let err = d.check("routing").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Cancelled);
        assert!(err.message.contains("routing"));
    }

    #[test]
    fn future_deadline_has_not_expired_yet() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(d.check("routing").is_ok());
    }
}
