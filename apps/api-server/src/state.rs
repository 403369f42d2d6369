//! Application state - shared across all handlers.

use std::sync::Arc;

use turnstile_core::ports::{IpBlocker, RateLimiter};
use turnstile_infra::{InMemoryIpBlocker, InMemoryRateLimiter};

use crate::config::AppConfig;

/// Shared application state.
///
/// Built once at startup; the limiter and blocker are the only owners of
/// bucket and block state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<dyn RateLimiter>,
    pub blocker: Arc<dyn IpBlocker>,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let limiter = Arc::new(InMemoryRateLimiter::new(config.rate_limit.clone()));
        let blocker = Arc::new(InMemoryIpBlocker::new(config.blocker.clone()));

        if config.admin_token.is_none() {
            tracing::warn!("ADMIN_TOKEN not set. Admin API disabled.");
        }

        tracing::info!(
            lock_shards = config.rate_limit.lock_shards,
            violation_threshold = config.blocker.violation_threshold,
            block_duration_secs = config.blocker.block_duration.as_secs(),
            "Application state initialized"
        );

        Self {
            limiter,
            blocker,
            admin_token: config.admin_token.as_deref().map(Arc::from),
        }
    }

    /// Build state around explicit components.
    pub fn from_parts(
        limiter: Arc<dyn RateLimiter>,
        blocker: Arc<dyn IpBlocker>,
        admin_token: Option<&str>,
    ) -> Self {
        Self {
            limiter,
            blocker,
            admin_token: admin_token.map(Arc::from),
        }
    }
}
