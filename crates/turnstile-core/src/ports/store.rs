use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Bucket, BucketKey};
use crate::error::StoreError;

/// Bucket storage backend.
///
/// Callers serialize read-modify-write per key themselves; a store only has
/// to make each individual call atomic.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Get the bucket for a key, expired or not.
    async fn get(&self, key: &BucketKey) -> Result<Option<Bucket>, StoreError>;

    /// Insert or replace the bucket for a key.
    async fn put(&self, key: BucketKey, bucket: Bucket) -> Result<(), StoreError>;

    /// Drop every bucket whose window ended before `now`. Returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Number of buckets held, expired ones included.
    async fn len(&self) -> usize;
}
