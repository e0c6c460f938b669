//! Consecutive-failure circuit breaker.
//!
//! Unlike a recovering breaker there is no half-open state: once the breaker
//! opens, the run is over.

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Entries are processed.
    Closed,
    /// Too many consecutive failures; the run must stop.
    Open,
}

/// Counts consecutive failures and opens at a fixed threshold.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    /// A closed breaker that opens after `threshold` failures in a row.
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    /// Any success closes the streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Returns the state after counting one more failure.
    pub fn record_failure(&mut self) -> CircuitState {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.state()
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        if self.consecutive_failures >= self.threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
