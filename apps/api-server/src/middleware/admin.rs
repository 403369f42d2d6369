//! Admin token extractor.

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::LocalBoxFuture;
use turnstile_core::DomainError;

use super::error::AppError;
use super::rate_limit::client_address;
use crate::state::AppState;

/// Proof that the request carried the admin bearer token.
///
/// Use this in handlers to require admin access:
/// ```ignore
/// async fn unblock(_admin: AdminAccess, path: web::Path<String>) -> impl Responder { .. }
/// ```
///
/// A missing or wrong token counts as a violation against the caller's
/// address, so token guessing escalates into a block like any other abuse.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequest for AdminAccess {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            tracing::error!("AppState not found in app data");
            return Box::pin(async { Err(AppError::Internal("Server configuration error".into())) });
        };

        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        let address = client_address(req);

        Box::pin(async move {
            let Some(expected) = state.admin_token.as_deref() else {
                return Err(AppError::ServiceUnavailable(
                    "Admin API is disabled: ADMIN_TOKEN is not configured.".into(),
                ));
            };

            if presented.as_deref() == Some(expected) {
                return Ok(AdminAccess);
            }

            let blocked = state.blocker.record_violation(&address).await;
            tracing::warn!(
                target: "security",
                event = "admin_auth_failed",
                ip = %address,
                blocked,
                "Rejected admin request"
            );
            Err(DomainError::Unauthorized.into())
        })
    }
}
