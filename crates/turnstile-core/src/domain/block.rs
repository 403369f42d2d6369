use chrono::{DateTime, Utc};
use serde::Serialize;

/// Rate limit denials reported for one address in the current tracking window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViolationRecord {
    pub count: u32,
    pub expire_time: DateTime<Utc>,
}

impl ViolationRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_time
    }
}

/// Hard deny for one address until `expire_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub expire_time: DateTime<Utc>,
}

impl BlockRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_time
    }
}

/// What the blocker currently knows about an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AddressStatus {
    Clear,
    Violating {
        count: u32,
        expires_at: DateTime<Utc>,
    },
    Blocked {
        until: DateTime<Utc>,
    },
}

impl AddressStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, AddressStatus::Blocked { .. })
    }
}
