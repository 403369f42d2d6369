//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the rate limit policy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub name: String,
    pub requests: u32,
    pub window_secs: u64,
}

/// Block state of an address as reported by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStatusResponse {
    pub address: String,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<u32>,
    /// When the current block or violation window ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a manual unblock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockResponse {
    pub address: String,
    pub unblocked: bool,
}
