use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Policy;
use crate::ports::deadline;

/// Identifier substituted when a caller supplies none.
pub const ANONYMOUS: &str = "anonymous";

/// Store key for a bucket: one bucket per (policy, identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub policy: String,
    pub identifier: String,
}

impl BucketKey {
    /// Build a key, substituting [`ANONYMOUS`] for an empty identifier.
    pub fn new(policy: impl Into<String>, identifier: &str) -> Self {
        let identifier = identifier.trim();
        Self {
            policy: policy.into(),
            identifier: if identifier.is_empty() {
                ANONYMOUS.to_string()
            } else {
                identifier.to_string()
            },
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate_limit:{}:{}", self.policy, self.identifier)
    }
}

/// Fixed-window counter state.
///
/// `tokens` is what is left *after* the requests already admitted in this
/// window. The window never refills partially: once `reset_time` has passed
/// the bucket is replaced wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub tokens: u32,
    pub reset_time: DateTime<Utc>,
    pub last_refill: DateTime<Utc>,
}

impl Bucket {
    /// A new window that has already admitted the request creating it.
    pub fn fresh(policy: &Policy, now: DateTime<Utc>) -> Self {
        Self {
            tokens: policy.requests.saturating_sub(1),
            reset_time: deadline(now, policy.window),
            last_refill: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_time
    }

    /// Take one token. Returns false once the window is exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}
