//! Incident response endpoints for address blocks.

use actix_web::{HttpResponse, web};
use turnstile_core::DomainError;
use turnstile_core::domain::AddressStatus;
use turnstile_shared::ApiResponse;
use turnstile_shared::dto::{BlockStatusResponse, UnblockResponse};

use crate::middleware::admin::AdminAccess;
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn parse_address(raw: &str) -> Result<String, DomainError> {
    let address = raw.trim();
    if address.is_empty() || address.len() > 255 {
        return Err(DomainError::InvalidAddress(format!("'{}'", raw)));
    }
    Ok(address.to_string())
}

/// GET /api/admin/blocks/{address}
pub async fn block_status(
    _admin: AdminAccess,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let address = parse_address(&path)?;

    let response = match state.blocker.status(&address).await {
        AddressStatus::Clear => BlockStatusResponse {
            address,
            blocked: false,
            violations: None,
            expires_at: None,
        },
        AddressStatus::Violating { count, expires_at } => BlockStatusResponse {
            address,
            blocked: false,
            violations: Some(count),
            expires_at: Some(expires_at),
        },
        AddressStatus::Blocked { until } => BlockStatusResponse {
            address,
            blocked: true,
            violations: None,
            expires_at: Some(until),
        },
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// DELETE /api/admin/blocks/{address}
pub async fn unblock(
    _admin: AdminAccess,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let address = parse_address(&path)?;
    let unblocked = state.blocker.unblock(&address).await;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(UnblockResponse { address, unblocked })))
}
