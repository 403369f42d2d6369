//! Application configuration loaded from environment variables.

use std::env;

use turnstile_infra::{IpBlockerConfig, RateLimitConfig};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    pub blocker: IpBlockerConfig,
    /// Bearer token for the admin API; the admin API is disabled without it.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            rate_limit: RateLimitConfig::from_env(),
            blocker: IpBlockerConfig::from_env(),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}
