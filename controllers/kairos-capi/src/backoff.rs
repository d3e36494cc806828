//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff mechanism for failed reconciles.
//! The delay grows more slowly than exponential backoff, so a control plane
//! waiting on a Secret or template that appears a little later is picked up
//! again quickly.
//!
//! Default sequence: 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Smallest delay in seconds
pub const DEFAULT_MIN_SECONDS: u64 = 5;

/// Largest delay in seconds
pub const DEFAULT_MAX_SECONDS: u64 = 300;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_seconds: u64,
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given bounds in seconds
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;

        let next = self.prev_seconds.saturating_add(self.current_seconds);
        self.prev_seconds = self.current_seconds;
        self.current_seconds = next.min(self.max_seconds);

        result
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_seconds = 0;
        self.current_seconds = self.min_seconds;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SECONDS, DEFAULT_MAX_SECONDS)
    }
}

/// Backoff state for one object
#[derive(Debug, Clone, Default)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

/// Per-object backoff, keyed by `namespace/name`
///
/// Shared by the error policy (which advances it) and the reconcile wrapper
/// (which resets it after a successful pass).
#[derive(Debug, Clone, Default)]
pub struct BackoffTable {
    states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl BackoffTable {
    /// Record a failure and return the delay before the next attempt
    /// together with the number of consecutive failures so far
    pub fn next_delay(&self, key: &str) -> (Duration, u32) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_default();
        state.error_count = state.error_count.saturating_add(1);
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the failures of an object after a successful pass
    pub fn reset(&self, key: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::default();

        let sequence: Vec<u64> = (0..12).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(sequence, vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300, 300]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(1, 10);

        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
        assert_eq!(backoff.next_backoff_seconds(), 3);

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_table_is_per_object() {
        let table = BackoffTable::default();

        assert_eq!(table.next_delay("default/a"), (Duration::from_secs(5), 1));
        assert_eq!(table.next_delay("default/a"), (Duration::from_secs(5), 2));
        assert_eq!(table.next_delay("default/a"), (Duration::from_secs(10), 3));
        assert_eq!(table.next_delay("default/b"), (Duration::from_secs(5), 1));

        table.reset("default/a");
        assert_eq!(table.next_delay("default/a"), (Duration::from_secs(5), 1));
    }
}
