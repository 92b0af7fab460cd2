//! Retry backoff for transiently failed tiles.
//!
//! The delay starts at the policy minimum and doubles with every further
//! failure, capped at the maximum:
//!
//! ```text
//! failure  1     2     3     4     5     6     7 ...
//! delay    D     2D    4D    8D    16D   32D   32D   (D = 1s, max = 32s)
//! ```

use std::time::{Duration, Instant};

use crate::config::SourceConfig;

/// Exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy. `max` is raised to `min` if it is smaller.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// Delay after a failure, given the delay of the previous one.
    pub fn next_delay(&self, previous: Option<Duration>) -> Duration {
        match previous {
            None => self.min,
            Some(delay) => delay.saturating_mul(2).clamp(self.min, self.max),
        }
    }

    /// Error record after a failure at `now`.
    ///
    /// # Arguments
    ///
    /// * `previous` - The tile's record from its last failure, if any
    /// * `now` - Time of the failure, from the scheduler clock
    pub fn record_failure(&self, previous: Option<&ErrorRecord>, now: Instant) -> ErrorRecord {
        ErrorRecord {
            last_failure: now,
            delay: self.next_delay(previous.map(|record| record.delay)),
            failures: previous.map_or(1, |record| record.failures.saturating_add(1)),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&SourceConfig::default())
    }
}

impl From<&SourceConfig> for BackoffPolicy {
    fn from(config: &SourceConfig) -> Self {
        Self::new(config.min_backoff, config.max_backoff)
    }
}

/// Backoff state of one failed tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorRecord {
    /// When the last attempt failed.
    pub last_failure: Instant,
    /// Wait before the next attempt.
    pub delay: Duration,
    /// Consecutive failures so far.
    pub failures: u32,
}

impl ErrorRecord {
    /// Earliest instant the tile may be retried.
    pub fn retry_at(&self) -> Instant {
        self.last_failure + self.delay
    }

    pub fn is_retry_due(&self, now: Instant) -> bool {
        now >= self.retry_at()
    }
}
