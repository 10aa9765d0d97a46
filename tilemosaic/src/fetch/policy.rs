//! Retry policy for tile requests.
//!
//! Attempts are counted including the first request, so `max_retries = 2`
//! means at most three HTTP calls for one tile.

use std::time::Duration;

/// How a tile request handles transient failures.
///
/// Transient failures are non-404 error statuses, transport errors and
/// response bodies that do not decode as images.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Single attempt, no retries.
    #[default]
    None,

    /// Constant delay between attempts.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },
}

impl RetryPolicy {
    /// Fixed-delay policy from a retry count and a wait between retries.
    pub fn from_retries(max_retries: u32, wait: Duration) -> Self {
        if max_retries == 0 {
            Self::None
        } else {
            Self::fixed(max_retries.saturating_add(1), wait)
        }
    }

    /// Creates a fixed retry policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Delay before the next attempt after `attempt` failures, or `None`
    /// once the attempt budget is spent.
    ///
    /// `attempt` is 1-based: 1 means the initial request just failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
        }
    }

    /// Maximum number of attempts, including the initial one.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => (*max_attempts).max(1),
        }
    }
}
