//! Caller-supplied deadlines.
//!
//! Every ledger operation accepts a [`Deadline`]. The engine refuses to start
//! work once it has elapsed and bounds store calls by the remaining time; the
//! Postgres store additionally turns it into a `lock_timeout`.

use std::time::{Duration, Instant};

/// Longest timeout accepted from callers and configuration, in milliseconds.
/// Matches the largest `lock_timeout` Postgres will take.
pub const MAX_TIMEOUT_MS: u64 = i32::MAX as u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline: wait on row locks for as long as the backend allows.
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(d) if d.is_zero())
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
    fn unbounded_deadline_never_expires() {
        let d = Deadline::none();
        assert!(d.remaining().is_none());
        assert!(!d.is_expired());
    }

    #[test]
    fn past_deadline_is_expired() {
        let d = Deadline::at(Instant::now() - Duration::from_millis(5));
        assert!(d.is_expired());
        assert_eq!(d.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn future_deadline_has_remaining_time() {
        let d = Deadline::after(Duration::from_secs(30));
        assert!(!d.is_expired());
        assert!(d.remaining().unwrap() > Duration::from_secs(29));
    }
}
