//! Striped mutexes for per-key read-modify-write.

use std::hash::{DefaultHasher, Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Fixed array of mutexes; a key always hashes to the same one.
///
/// Two requests for the same key are serialized. Unrelated keys only contend
/// when they land on the same shard.
pub struct ShardedLocks {
    shards: Vec<Mutex<()>>,
}

impl ShardedLocks {
    /// `count` is clamped to at least one shard.
    pub fn new(count: usize) -> Self {
        Self {
            shards: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_index<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub async fn lock<K: Hash + ?Sized>(&self, key: &K) -> MutexGuard<'_, ()> {
        self.shards[self.shard_index(key)].lock().await
    }
}
