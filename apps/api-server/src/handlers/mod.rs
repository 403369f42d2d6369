//! HTTP handlers and route configuration.

mod admin;
mod health;
mod policies;

use actix_web::web;

use crate::middleware::rate_limit::{RateLimitMiddleware, api_key_identifier};
use crate::state::AppState;

/// Configure all application routes.
///
/// More specific scopes are registered first: actix matches scopes by
/// prefix in registration order.
pub fn configure_routes(cfg: &mut web::ServiceConfig, state: &AppState) {
    let limit = |policy| {
        RateLimitMiddleware::new(state.limiter.clone(), state.blocker.clone(), policy)
    };

    cfg.service(
        web::scope("/api/admin")
            .wrap(limit("auth").escalate(true))
            .route("/blocks/{address}", web::get().to(admin::block_status))
            .route("/blocks/{address}", web::delete().to(admin::unblock)),
    )
    .service(
        web::scope("/api/v1")
            .wrap(limit("api").with_identifier(api_key_identifier))
            .route("/policies", web::get().to(policies::list_policies)),
    )
    .service(
        web::scope("/api")
            .wrap(limit("default").escalate(true))
            .route("/health", web::get().to(health::health_check))
            .route("/policies", web::get().to(policies::list_policies)),
    );
}
