pub mod bookings;
pub mod catalog;
pub mod coupons;
pub mod health;
pub mod loyalty;

use axum::extract::FromRequest;
use axum::http::HeaderMap;

use crate::errors::AppError;

/// `axum::Json` whose rejections render as the `{success:false, error}` envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Admin gate: `Authorization: Bearer <ADMIN_TOKEN>`.
pub(crate) fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
