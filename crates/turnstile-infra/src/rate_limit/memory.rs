//! In-memory fixed-window rate limiter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use turnstile_core::StoreError;
use turnstile_core::domain::{Bucket, BucketKey, Decision, Policy, PolicyTable};
use turnstile_core::ports::{BucketStore, ClientRequest, Clock, RateLimiter, SystemClock, deadline};

use super::locks::ShardedLocks;
use super::store::InMemoryBucketStore;

/// In-memory rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Number of lock shards; 1 gives a single process-wide lock.
    pub lock_shards: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { lock_shards: 64 }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            lock_shards: std::env::var("RATE_LIMIT_LOCK_SHARDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64),
        }
    }
}

/// Fixed-window rate limiter keyed by (policy, identifier).
///
/// A request is allowed iff it is among the first `limit` requests of its
/// window. Store faults fail open.
/// Note: Limits are per-process, not distributed across instances.
pub struct InMemoryRateLimiter {
    store: Arc<dyn BucketStore>,
    policies: PolicyTable,
    locks: ShardedLocks,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemoryBucketStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    /// Build with an explicit store and clock.
    pub fn with_parts(
        config: RateLimitConfig,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policies: PolicyTable::default(),
            locks: ShardedLocks::new(config.lock_shards),
            clock,
        }
    }

    /// Buckets currently held, including expired ones not yet swept.
    pub async fn tracked_buckets(&self) -> usize {
        self.store.len().await
    }

    async fn consume(
        &self,
        policy: &Policy,
        key: BucketKey,
        now: DateTime<Utc>,
    ) -> Result<Decision, StoreError> {
        // Held across get and put so concurrent requests on a key never both
        // see the same token count.
        let _guard = self.locks.lock(&key).await;

        let (bucket, allowed) = match self.store.get(&key).await? {
            Some(mut bucket) if !bucket.is_expired(now) => {
                let allowed = bucket.try_consume();
                (bucket, allowed)
            }
            _ => (Bucket::fresh(policy, now), policy.requests > 0),
        };

        self.store.put(key, bucket).await?;

        Ok(Decision {
            allowed,
            remaining: bucket.tokens,
            reset_time: bucket.reset_time,
            limit: policy.requests,
        })
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, policy_name: &str, identifier: &str) -> Decision {
        let policy = self.policies.resolve(policy_name);
        let key = BucketKey::new(policy_name, identifier);
        let now = self.clock.now();

        match self.consume(policy, key.clone(), now).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Rate limiter store error, failing open");
                Decision {
                    allowed: true,
                    remaining: policy.requests,
                    reset_time: deadline(now, policy.window),
                    limit: policy.requests,
                }
            }
        }
    }

    async fn check_request(
        &self,
        request: &ClientRequest,
        policy_name: &str,
        identifier_override: Option<&str>,
    ) -> Decision {
        let client_addr = request.client_addr.as_deref().unwrap_or_default();
        let identifier = identifier_override
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(client_addr);

        let decision = self.check(policy_name, identifier).await;

        if !decision.allowed || decision.is_low() {
            let policy = self.policies.resolve(policy_name);
            tracing::info!(
                target: "security",
                event = "rate_limit_check",
                ip = %client_addr,
                policy = %policy_name,
                identifier = %identifier,
                allowed = decision.allowed,
                remaining = decision.remaining,
                limit = policy.requests,
                window_secs = policy.window.as_secs(),
                "Rate limit check"
            );
        }

        decision
    }

    async fn sweep_expired(&self) -> usize {
        match self.store.purge_expired(self.clock.now()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Bucket sweep failed");
                0
            }
        }
    }

    fn policies(&self) -> Vec<Policy> {
        self.policies.iter().cloned().collect()
    }
}
