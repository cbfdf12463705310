use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

use crate::errors::AppError;
use crate::handlers::{check_admin, JsonBody};
use crate::models::NewCoupon;
use crate::services::coupons;
use crate::state::AppState;

// GET /api/coupons
pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let coupons = {
        let db = state.db()?;
        coupons::list_coupons(&db)?
    };
    Ok(Json(serde_json::json!({"success": true, "coupons": coupons})))
}

// POST /api/coupons (admin)
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<NewCoupon>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let coupon = {
        let db = state.db()?;
        coupons::create_coupon(&db, body)?
    };
    Ok(Json(serde_json::json!({"success": true, "coupon": coupon})))
}
