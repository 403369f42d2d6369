//! Rate limiting implementations.

mod locks;
mod memory;
mod store;
mod tests;

pub use locks::ShardedLocks;
pub use memory::{InMemoryRateLimiter, RateLimitConfig};
pub use store::InMemoryBucketStore;
