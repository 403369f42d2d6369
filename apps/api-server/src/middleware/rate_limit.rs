//! Rate limiting middleware.
//!
//! One pipeline stage per route scope: the block check runs first, then the
//! rate check for the scope's policy. Denials become 403 (blocked) or 429
//! (rate limited); allowed responses carry the `X-RateLimit-*` headers.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use futures::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use turnstile_core::domain::{ANONYMOUS, Decision};
use turnstile_core::ports::{ClientRequest, IpBlocker, RateLimiter};
use turnstile_shared::ErrorResponse;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Derives a rate limit identifier from the request instead of its address.
pub type IdentifierFn = fn(&ServiceRequest) -> Option<String>;

/// Keys requests by their `X-Api-Key` header.
pub fn api_key_identifier(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| format!("key:{}", key))
}

/// Client address as seen by the limiter and the blocker.
///
/// Always the transport peer. `Forwarded` and `X-Forwarded-For` are client
/// controlled and never consulted.
pub fn client_address(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Rate limiting middleware factory.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    blocker: Arc<dyn IpBlocker>,
    policy: &'static str,
    identifier: Option<IdentifierFn>,
    escalate: bool,
}

impl RateLimitMiddleware {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        blocker: Arc<dyn IpBlocker>,
        policy: &'static str,
    ) -> Self {
        Self {
            limiter,
            blocker,
            policy,
            identifier: None,
            escalate: false,
        }
    }

    /// Key the policy by something other than the client address.
    pub fn with_identifier(mut self, identifier: IdentifierFn) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Report every denial in this scope to the IP blocker.
    pub fn escalate(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            config: self.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    config: RateLimitMiddleware,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let address = client_address(req.request());

            if config.blocker.is_blocked(&address).await {
                tracing::warn!(ip = %address, path = %req.path(), "Rejected blocked address");
                let response = HttpResponse::Forbidden().json(ErrorResponse::blocked());
                return Ok(req.into_response(response).map_into_right_body());
            }

            let identifier = config.identifier.and_then(|extract| extract(&req));
            let decision = config
                .limiter
                .check_request(
                    &ClientRequest::from_addr(address.clone()),
                    config.policy,
                    identifier.as_deref(),
                )
                .await;

            if !decision.allowed {
                if config.escalate && config.blocker.record_violation(&address).await {
                    tracing::warn!(ip = %address, policy = config.policy, "Address is now blocked");
                }

                let retry_after = decision.retry_after(chrono::Utc::now());
                let mut response = HttpResponse::TooManyRequests()
                    .insert_header((RETRY_AFTER, retry_after))
                    .json(ErrorResponse::too_many_requests(retry_after));
                insert_rate_limit_headers(response.headers_mut(), &decision);

                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            insert_rate_limit_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_timestamp()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};
    use std::net::SocketAddr;
    use turnstile_infra::{InMemoryIpBlocker, InMemoryRateLimiter, IpBlockerConfig};

    fn peer() -> SocketAddr {
        "203.0.113.5:40000".parse().unwrap()
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn test_allowed_response_carries_headers() {
        let middleware = RateLimitMiddleware::new(
            Arc::new(InMemoryRateLimiter::default()),
            Arc::new(InMemoryIpBlocker::default()),
            "auth",
        );
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "100");
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "99");
        assert!(res.headers().contains_key("x-ratelimit-reset"));
    }

    #[actix_web::test]
    async fn test_exhausted_window_returns_429() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware =
            RateLimitMiddleware::new(limiter, Arc::new(InMemoryIpBlocker::default()), "auth");
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        for _ in 0..100 {
            let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), "0");
        let retry_after: u64 = res
            .headers()
            .get(RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry_after));
    }

    #[actix_web::test]
    async fn test_escalation_blocks_address() {
        let blocker = Arc::new(InMemoryIpBlocker::new(IpBlockerConfig {
            violation_threshold: 2,
            ..IpBlockerConfig::default()
        }));
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware = RateLimitMiddleware::new(limiter, blocker.clone(), "auth").escalate(true);
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        for _ in 0..100 {
            let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
            test::call_service(&app, req).await;
        }
        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::TOO_MANY_REQUESTS
            );
        }

        assert!(blocker.is_blocked("203.0.113.5").await);
        let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_blocked_address_skips_rate_limiter() {
        let blocker = Arc::new(InMemoryIpBlocker::default());
        for _ in 0..10 {
            blocker.record_violation("203.0.113.5").await;
        }
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware = RateLimitMiddleware::new(limiter.clone(), blocker, "auth");
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        let req = test::TestRequest::get().uri("/").peer_addr(peer()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
        assert_eq!(limiter.tracked_buckets().await, 0);
    }

    #[actix_web::test]
    async fn test_api_key_identifier_keys_by_header() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware =
            RateLimitMiddleware::new(limiter.clone(), Arc::new(InMemoryIpBlocker::default()), "api")
                .with_identifier(api_key_identifier);
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        let req = test::TestRequest::get()
            .uri("/")
            .peer_addr(peer())
            .insert_header(("X-Api-Key", "abc123"))
            .to_request();
        test::call_service(&app, req).await;

        assert_eq!(limiter.check("api", "key:abc123").await.remaining, 9998);
    }

    #[actix_web::test]
    async fn test_blank_api_key_falls_back_to_address() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware =
            RateLimitMiddleware::new(limiter.clone(), Arc::new(InMemoryIpBlocker::default()), "api")
                .with_identifier(api_key_identifier);
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        let req = test::TestRequest::get()
            .uri("/")
            .peer_addr(peer())
            .insert_header(("X-Api-Key", "   "))
            .to_request();
        test::call_service(&app, req).await;

        assert_eq!(limiter.check("api", "203.0.113.5").await.remaining, 9998);
        assert_eq!(limiter.check("api", "key:").await.remaining, 9999);
    }

    #[actix_web::test]
    async fn test_forwarded_for_does_not_change_bucket() {
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware =
            RateLimitMiddleware::new(limiter, Arc::new(InMemoryIpBlocker::default()), "auth");
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        for i in 0..100 {
            let req = test::TestRequest::get()
                .uri("/")
                .peer_addr(peer())
                .insert_header(("X-Forwarded-For", format!("192.0.2.{}", i)))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/")
            .peer_addr(peer())
            .insert_header(("X-Forwarded-For", "192.0.2.200"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn test_forwarded_for_cannot_block_another_address() {
        let blocker = Arc::new(InMemoryIpBlocker::new(IpBlockerConfig {
            violation_threshold: 2,
            ..IpBlockerConfig::default()
        }));
        let limiter = Arc::new(InMemoryRateLimiter::default());
        let middleware = RateLimitMiddleware::new(limiter, blocker.clone(), "auth").escalate(true);
        let app = test::init_service(App::new().wrap(middleware).route("/", web::get().to(ok))).await;

        for _ in 0..110 {
            let req = test::TestRequest::get()
                .uri("/")
                .peer_addr(peer())
                .insert_header(("X-Forwarded-For", "192.0.2.77"))
                .insert_header(("Forwarded", "for=192.0.2.77"))
                .to_request();
            test::call_service(&app, req).await;
        }

        assert!(!blocker.is_blocked("192.0.2.77").await);
        assert!(blocker.is_blocked("203.0.113.5").await);
    }

    #[actix_web::test]
    async fn test_missing_peer_is_anonymous() {
        let req = test::TestRequest::get().uri("/").to_http_request();
        assert_eq!(client_address(&req), ANONYMOUS);
    }
}
