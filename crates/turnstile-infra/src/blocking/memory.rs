//! In-memory IP blocker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use turnstile_core::domain::{AddressStatus, BlockRecord, ViolationRecord};
use turnstile_core::ports::{Clock, IpBlocker, SystemClock, deadline};

/// IP blocker configuration.
#[derive(Debug, Clone)]
pub struct IpBlockerConfig {
    /// Violations within one tracking window that trigger a block.
    pub violation_threshold: u32,
    /// Length of both the violation tracking window and the block.
    pub block_duration: Duration,
}

impl Default for IpBlockerConfig {
    fn default() -> Self {
        Self {
            violation_threshold: 10,
            block_duration: Duration::from_secs(3600),
        }
    }
}

impl IpBlockerConfig {
    pub fn from_env() -> Self {
        Self {
            violation_threshold: std::env::var("IP_BLOCK_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
            block_duration: Duration::from_secs(
                std::env::var("IP_BLOCK_DURATION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }
}

#[derive(Default)]
struct BlockTables {
    violations: HashMap<String, ViolationRecord>,
    blocks: HashMap<String, BlockRecord>,
}

impl BlockTables {
    /// Unexpired block for `address`, dropping an expired one on the way.
    fn active_block(&mut self, address: &str, now: DateTime<Utc>) -> Option<BlockRecord> {
        match self.blocks.get(address) {
            Some(block) if block.is_expired(now) => {
                self.blocks.remove(address);
                None
            }
            other => other.copied(),
        }
    }

    fn active_violation(&mut self, address: &str, now: DateTime<Utc>) -> Option<ViolationRecord> {
        match self.violations.get(address) {
            Some(record) if record.is_expired(now) => {
                self.violations.remove(address);
                None
            }
            other => other.copied(),
        }
    }
}

/// Tracks violations per address and blocks repeat offenders.
///
/// Both tables sit behind one mutex so promoting a violation record to a
/// block is atomic. State is lost on restart.
pub struct InMemoryIpBlocker {
    tables: Mutex<BlockTables>,
    config: IpBlockerConfig,
    clock: Arc<dyn Clock>,
}

impl InMemoryIpBlocker {
    pub fn new(config: IpBlockerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_env() -> Self {
        Self::new(IpBlockerConfig::from_env())
    }

    pub fn with_clock(config: IpBlockerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(BlockTables::default()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &IpBlockerConfig {
        &self.config
    }
}

impl Default for InMemoryIpBlocker {
    fn default() -> Self {
        Self::new(IpBlockerConfig::default())
    }
}

#[async_trait]
impl IpBlocker for InMemoryIpBlocker {
    async fn record_violation(&self, address: &str) -> bool {
        let now = self.clock.now();
        let mut tables = self.tables.lock().await;

        if tables.active_block(address, now).is_some() {
            return true;
        }

        let expire_time = deadline(now, self.config.block_duration);
        let count = match tables.active_violation(address, now) {
            Some(record) => record.count.saturating_add(1),
            None => 1,
        };

        if count >= self.config.violation_threshold {
            tables.violations.remove(address);
            tables
                .blocks
                .insert(address.to_string(), BlockRecord { expire_time });

            tracing::warn!(
                target: "security",
                event = "ip_blocked",
                ip = %address,
                violations = count,
                duration = self.config.block_duration.as_secs(),
                "IP blocked after repeated rate limit violations"
            );
            return true;
        }

        tables
            .violations
            .entry(address.to_string())
            .and_modify(|record| record.count = count)
            .or_insert(ViolationRecord { count, expire_time });

        tracing::debug!(ip = %address, violations = count, "Rate limit violation recorded");
        false
    }

    async fn is_blocked(&self, address: &str) -> bool {
        let now = self.clock.now();
        self.tables
            .lock()
            .await
            .active_block(address, now)
            .is_some()
    }

    async fn unblock(&self, address: &str) -> bool {
        {
            let mut tables = self.tables.lock().await;
            tables.blocks.remove(address);
            tables.violations.remove(address);
        }

        tracing::warn!(target: "security", event = "ip_unblocked", ip = %address, "IP unblocked");
        true
    }

    async fn status(&self, address: &str) -> AddressStatus {
        let now = self.clock.now();
        let mut tables = self.tables.lock().await;

        if let Some(block) = tables.active_block(address, now) {
            return AddressStatus::Blocked {
                until: block.expire_time,
            };
        }

        match tables.active_violation(address, now) {
            Some(record) => AddressStatus::Violating {
                count: record.count,
                expires_at: record.expire_time,
            },
            None => AddressStatus::Clear,
        }
    }

    async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut tables = self.tables.lock().await;
        let before = tables.blocks.len() + tables.violations.len();

        tables.blocks.retain(|_, block| !block.is_expired(now));
        tables.violations.retain(|_, record| !record.is_expired(now));

        before - (tables.blocks.len() + tables.violations.len())
    }
}
