//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod blocker;
mod clock;
mod rate_limit;
mod store;

pub use blocker::IpBlocker;
pub use clock::{Clock, ManualClock, SystemClock, deadline};
pub use rate_limit::{ClientRequest, RateLimiter};
pub use store::BucketStore;
