//! Rate limiting port.

use async_trait::async_trait;

use crate::domain::{Decision, Policy};

/// The parts of an inbound request the limiter cares about.
#[derive(Debug, Clone, Default)]
pub struct ClientRequest {
    /// Source address as resolved by the HTTP layer, if any.
    pub client_addr: Option<String>,
}

impl ClientRequest {
    pub fn from_addr(addr: impl Into<String>) -> Self {
        Self {
            client_addr: Some(addr.into()),
        }
    }
}

/// Rate limiter trait - abstraction over rate limiting backends.
///
/// Never fails: backend faults degrade to an allowing decision.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check and count one request for `(policy, identifier)`.
    async fn check(&self, policy: &str, identifier: &str) -> Decision;

    /// Like [`RateLimiter::check`], keyed by `identifier_override` when given,
    /// otherwise by the request's client address.
    async fn check_request(
        &self,
        request: &ClientRequest,
        policy: &str,
        identifier_override: Option<&str>,
    ) -> Decision;

    /// Drop buckets whose window has ended. Returns how many were removed.
    async fn sweep_expired(&self) -> usize;

    /// The policy table in effect.
    fn policies(&self) -> Vec<Policy>;
}
