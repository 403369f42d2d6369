//! Violation escalation and address blocking.

mod memory;

pub use memory::{InMemoryIpBlocker, IpBlockerConfig};
