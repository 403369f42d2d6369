//! Rate limit policy listing.

use actix_web::{HttpResponse, web};
use turnstile_shared::ApiResponse;
use turnstile_shared::dto::PolicyResponse;

use crate::state::AppState;

/// GET /api/policies
pub async fn list_policies(state: web::Data<AppState>) -> HttpResponse {
    let policies: Vec<PolicyResponse> = state
        .limiter
        .policies()
        .into_iter()
        .map(|p| PolicyResponse {
            name: p.name.to_string(),
            requests: p.requests,
            window_secs: p.window.as_secs(),
        })
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok(policies))
}
