use async_trait::async_trait;

use crate::domain::AddressStatus;

/// Escalates repeated rate limit violations into temporary address blocks.
#[async_trait]
pub trait IpBlocker: Send + Sync {
    /// Count one violation. Returns true when the address is (now) blocked.
    async fn record_violation(&self, address: &str) -> bool;

    /// True while an unexpired block exists for the address.
    async fn is_blocked(&self, address: &str) -> bool;

    /// Clear any block and violation count for the address. Always true.
    async fn unblock(&self, address: &str) -> bool;

    /// Current state for the address.
    async fn status(&self, address: &str) -> AddressStatus;

    /// Drop expired violation and block records. Returns how many.
    async fn sweep_expired(&self) -> usize;
}
