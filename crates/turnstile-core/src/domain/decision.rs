use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a rate limit check.
///
/// Advisory only: the caller turns `allowed == false` into a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    /// Limit of the resolved policy, for `X-RateLimit-Limit`.
    pub limit: u32,
}

impl Decision {
    /// Unix timestamp of the window reset, for `X-RateLimit-Reset`.
    pub fn reset_timestamp(&self) -> i64 {
        self.reset_time.timestamp()
    }

    /// Seconds until the window resets, never less than one.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_time - now).num_seconds().max(1) as u64
    }

    /// True when less than a fifth of the limit is left.
    pub fn is_low(&self) -> bool {
        (self.remaining as u64) * 5 < self.limit as u64
    }
}
