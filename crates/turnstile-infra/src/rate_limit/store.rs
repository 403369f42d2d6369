//! In-memory bucket store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use turnstile_core::StoreError;
use turnstile_core::domain::{Bucket, BucketKey};
use turnstile_core::ports::BucketStore;

/// Bucket store backed by a HashMap behind an async RwLock.
///
/// Note: State is per-process and lost on restart.
pub struct InMemoryBucketStore {
    buckets: RwLock<HashMap<BucketKey, Bucket>>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BucketStore for InMemoryBucketStore {
    async fn get(&self, key: &BucketKey) -> Result<Option<Bucket>, StoreError> {
        Ok(self.buckets.read().await.get(key).copied())
    }

    async fn put(&self, key: BucketKey, bucket: Bucket) -> Result<(), StoreError> {
        self.buckets.write().await.insert(key, bucket);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        Ok(before - buckets.len())
    }

    async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }
}
