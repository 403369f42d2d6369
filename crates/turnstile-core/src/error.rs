//! Domain-level error types.

use thiserror::Error;

/// Bucket store failures. Never surfaced to request handlers: the limiter
/// fails open on any of these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupted bucket state for {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

/// Domain errors surfaced through the admin API.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unauthorized access")]
    Unauthorized,
}
