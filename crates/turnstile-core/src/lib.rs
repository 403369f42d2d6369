//! # Turnstile Core
//!
//! The domain layer of Turnstile: fixed-window rate limit buckets, the policy
//! table, IP block records, and the ports infrastructure implements.
//! No I/O and no runtime dependencies live here.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{DomainError, StoreError};
