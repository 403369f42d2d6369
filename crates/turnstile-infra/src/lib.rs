//! # Turnstile Infrastructure
//!
//! Concrete implementations of the ports defined in `turnstile-core`:
//! an in-memory bucket store, the fixed-window rate limiter built on it,
//! and the IP blocker that escalates repeated violations.
//!
//! Everything here is per-process and in-memory; a restart clears all
//! buckets, violation counts and blocks.

pub mod blocking;
pub mod rate_limit;

pub use blocking::{InMemoryIpBlocker, IpBlockerConfig};
pub use rate_limit::{InMemoryBucketStore, InMemoryRateLimiter, RateLimitConfig, ShardedLocks};
