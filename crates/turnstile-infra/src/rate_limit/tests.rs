#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};

    use crate::rate_limit::{InMemoryBucketStore, InMemoryRateLimiter, RateLimitConfig};
    use turnstile_core::StoreError;
    use turnstile_core::domain::{Bucket, BucketKey};
    use turnstile_core::ports::{BucketStore, ClientRequest, Clock, ManualClock, RateLimiter};

    fn limiter_with_clock() -> (InMemoryRateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let limiter = InMemoryRateLimiter::with_parts(
            RateLimitConfig::default(),
            Arc::new(InMemoryBucketStore::new()),
            clock.clone(),
        );
        (limiter, clock)
    }

    /// Store whose reads always fail.
    struct FailingStore;

    #[async_trait]
    impl BucketStore for FailingStore {
        async fn get(&self, key: &BucketKey) -> Result<Option<Bucket>, StoreError> {
            Err(StoreError::Corrupted {
                key: key.to_string(),
                reason: "injected".to_string(),
            })
        }

        async fn put(&self, _key: BucketKey, _bucket: Bucket) -> Result<(), StoreError> {
            Ok(())
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("injected".to_string()))
        }

        async fn len(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_first_request_consumes_one_token() {
        let (limiter, clock) = limiter_with_clock();

        let decision = limiter.check("auth", "test_ip").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 99);
        assert_eq!(decision.limit, 100);
        assert_eq!(decision.reset_time, clock.now() + TimeDelta::seconds(60));
    }

    #[tokio::test]
    async fn test_auth_window_exhaustion_and_reset() {
        let (limiter, clock) = limiter_with_clock();

        for i in 0..100 {
            let decision = limiter.check("auth", "203.0.113.5").await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 99 - i);
        }

        let denied = limiter.check("auth", "203.0.113.5").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);

        clock.advance(Duration::from_secs(61));

        let after_reset = limiter.check("auth", "203.0.113.5").await;
        assert!(after_reset.allowed);
        assert_eq!(after_reset.remaining, 99);
    }

    #[tokio::test]
    async fn test_window_still_closed_at_reset_instant() {
        let (limiter, clock) = limiter_with_clock();

        for _ in 0..100 {
            limiter.check("auth", "a").await;
        }
        clock.advance(Duration::from_secs(60));
        assert!(!limiter.check("auth", "a").await.allowed);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (limiter, _clock) = limiter_with_clock();

        for _ in 0..100 {
            limiter.check("auth", "ip1").await;
        }
        assert!(!limiter.check("auth", "ip1").await.allowed);

        let other = limiter.check("auth", "ip2").await;
        assert!(other.allowed);
        assert_eq!(other.remaining, 99);
    }

    #[tokio::test]
    async fn test_policies_are_independent() {
        let (limiter, _clock) = limiter_with_clock();

        for _ in 0..100 {
            limiter.check("auth", "10.0.0.9").await;
        }
        let decision = limiter.check("default", "10.0.0.9").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 999);
    }

    #[tokio::test]
    async fn test_unknown_policy_uses_default_limits() {
        let (limiter, _clock) = limiter_with_clock();
        let (reference, _) = limiter_with_clock();

        let unknown = limiter.check("nonexistent_policy", "x").await;
        let default = reference.check("default", "x").await;
        assert_eq!(unknown, default);
        assert_eq!(unknown.limit, 1000);
        assert_eq!(unknown.remaining, 999);
    }

    #[tokio::test]
    async fn test_empty_identifier_shares_anonymous_bucket() {
        let (limiter, _clock) = limiter_with_clock();

        limiter.check("auth", "").await;
        let decision = limiter.check("auth", "anonymous").await;
        assert_eq!(decision.remaining, 98);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = InMemoryRateLimiter::with_parts(
            RateLimitConfig::default(),
            Arc::new(FailingStore),
            Arc::new(ManualClock::default()),
        );

        for _ in 0..3 {
            let decision = limiter.check("default", "y").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 1000);
        }
        assert_eq!(limiter.sweep_expired().await, 0);
    }

    #[tokio::test]
    async fn test_check_request_prefers_override() {
        let (limiter, _clock) = limiter_with_clock();
        let request = ClientRequest::from_addr("198.51.100.7");

        limiter
            .check_request(&request, "auth", Some("user-42"))
            .await;
        let by_user = limiter.check("auth", "user-42").await;
        assert_eq!(by_user.remaining, 98);

        let by_ip = limiter.check_request(&request, "auth", None).await;
        assert_eq!(by_ip.remaining, 99);

        let blank_override = limiter.check_request(&request, "auth", Some("")).await;
        assert_eq!(blank_override.remaining, 98);
    }

    #[tokio::test]
    async fn test_check_request_without_address_is_anonymous() {
        let (limiter, _clock) = limiter_with_clock();

        limiter
            .check_request(&ClientRequest::default(), "auth", None)
            .await;
        assert_eq!(limiter.check("auth", "anonymous").await.remaining, 98);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_buckets() {
        let (limiter, clock) = limiter_with_clock();

        limiter.check("auth", "short-lived").await;
        limiter.check("api", "long-lived").await;
        assert_eq!(limiter.tracked_buckets().await, 2);

        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.sweep_expired().await, 1);
        assert_eq!(limiter.tracked_buckets().await, 1);

        let decision = limiter.check("api", "long-lived").await;
        assert_eq!(decision.remaining, 9998);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_never_exceed_limit() {
        let (limiter, _clock) = limiter_with_clock();
        let limiter = Arc::new(limiter);
        let allowed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..250)
            .map(|_| {
                let limiter = limiter.clone();
                let allowed = allowed.clone();
                tokio::spawn(async move {
                    if limiter.check("auth", "10.1.1.1").await.allowed {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_single_shard_behaves_the_same() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig { lock_shards: 1 });

        for _ in 0..100 {
            assert!(limiter.check("auth", "10.0.0.1").await.allowed);
        }
        assert!(!limiter.check("auth", "10.0.0.1").await.allowed);
    }

    #[test]
    fn test_policy_table_exposed() {
        let limiter = InMemoryRateLimiter::default();
        let names: Vec<_> = limiter.policies().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["default", "auth", "api"]);
    }

    /// Records the `remaining` field of every `security` event.
    #[derive(Clone, Default)]
    struct SecurityEvents(Arc<std::sync::Mutex<Vec<u64>>>);

    impl SecurityEvents {
        fn remaining(&self) -> Vec<u64> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RemainingField(Option<u64>);

    impl tracing::field::Visit for RemainingField {
        fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
            if field.name() == "remaining" {
                self.0 = Some(value);
            }
        }

        fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SecurityEvents {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if event.metadata().target() != "security" {
                return;
            }
            let mut remaining = RemainingField(None);
            event.record(&mut remaining);
            self.0.lock().unwrap().push(remaining.0.unwrap_or(u64::MAX));
        }
    }

    #[tokio::test]
    async fn test_check_request_logs_only_denied_or_low() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = SecurityEvents::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

        let (limiter, _clock) = limiter_with_clock();
        let request = ClientRequest::from_addr("10.0.0.1");

        // remaining 99 down to 20: at or above 20% of 100
        for _ in 0..80 {
            assert!(limiter.check_request(&request, "auth", None).await.allowed);
        }
        assert!(events.remaining().is_empty());

        let decision = limiter.check_request(&request, "auth", None).await;
        assert_eq!(decision.remaining, 19);
        assert_eq!(events.remaining(), vec![19]);

        for _ in 0..19 {
            assert!(limiter.check_request(&request, "auth", None).await.allowed);
        }
        let denied = limiter.check_request(&request, "auth", None).await;
        assert!(!denied.allowed);

        let logged = events.remaining();
        assert_eq!(logged.len(), 21);
        assert_eq!(logged[logged.len() - 2..], [0, 0]);
    }
}
