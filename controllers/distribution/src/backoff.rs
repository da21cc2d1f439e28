//! # Fibonacci Backoff
//!
//! Requeue delays for failed reconciliation passes. The sequence grows more
//! slowly than exponential backoff: 1m, 1m, 2m, 3m, 5m, 8m, then capped at
//! 10m. Delays are tracked per owner object and reset after a clean pass.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Delay used when the tracker state cannot be read.
const FALLBACK_DELAY: Duration = Duration::from_secs(60);

/// Fibonacci backoff calculator, in whole minutes.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Sequence starting at `min_minutes` (twice) and capped at `max_minutes`.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Returns the current delay and advances the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        let result = Duration::from_secs(self.current_minutes * 60);
        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);
        result
    }

    /// Restarts the sequence.
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

/// Per-object backoff state, keyed by `namespace/name`.
#[derive(Debug)]
pub struct BackoffTracker {
    min_minutes: u64,
    max_minutes: u64,
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self::new(1, 10) // 1 minute min, 10 minutes max
    }
}

impl BackoffTracker {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next requeue delay for `key` after a failed pass.
    pub fn next_for(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| FibonacciBackoff::new(self.min_minutes, self.max_minutes))
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff state: {}, using default backoff", e);
                FALLBACK_DELAY
            }
        }
    }

    /// Forgets the failures of `key` after a clean pass or once the object
    /// is deleted.
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.states.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}
