//! Circuit breaker guarding the history provider.
//!
//! Opens immediately on HTTP 403 or after `threshold` consecutive failures and
//! refuses every request until the cooldown has elapsed.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    cooldown: Duration,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, threshold: u32) -> Self {
        Self {
            state: Mutex::new(State::Closed { failures: 0 }),
            cooldown,
            threshold: threshold.max(1),
        }
    }

    /// Cooldown in seconds, three consecutive failures.
    pub fn with_cooldown_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs), 3)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request may go out now. Closes the breaker once the cooldown is over.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => true,
            State::Open { since } if since.elapsed() >= self.cooldown => {
                *state = State::Closed { failures: 0 };
                true
            }
            State::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if let State::Closed { failures } = &mut *state {
            *failures = 0;
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        if let State::Closed { failures } = &mut *state {
            *failures += 1;
            if *failures >= self.threshold {
                warn!(failures = *failures, cooldown_secs = self.cooldown.as_secs(), "circuit breaker opened");
                *state = State::Open { since: Instant::now() };
            }
        }
    }

    /// Open immediately, e.g. when the provider answers 403.
    pub fn trip(&self) {
        warn!(cooldown_secs = self.cooldown.as_secs(), "circuit breaker tripped");
        *self.lock() = State::Open { since: Instant::now() };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match *self.lock() {
            State::Closed { .. } => Duration::ZERO,
            State::Open { since } => self.cooldown.saturating_sub(since.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 2);
        cb.record_failure();
        assert!(cb.is_allowed());
        cb.record_failure();
        assert!(!cb.is_allowed());
        assert!(cb.remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn success_clears_failure_count() {
        let cb = CircuitBreaker::new(Duration::from_secs(60), 2);
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_allowed());
    }

    #[test]
    fn trip_then_cooldown_closes_again() {
        let cb = CircuitBreaker::new(Duration::from_millis(10), 3);
        cb.trip();
        assert!(!cb.is_allowed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.is_allowed());
        assert_eq!(cb.remaining_cooldown(), Duration::ZERO);
    }
}
