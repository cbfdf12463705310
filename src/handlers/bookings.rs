use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::JsonBody;
use crate::models::NewBooking;
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewBooking>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let mut db = state.db()?;
        state.bookings.create_booking(&mut db, body)?
    };
    Ok(Json(serde_json::json!({"success": true, "booking": booking})))
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        state.bookings.list_bookings(&db)?
    };
    Ok(Json(serde_json::json!({"success": true, "bookings": bookings})))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let db = state.db()?;
        state.bookings.get_booking(&db, &id)?
    };
    Ok(Json(serde_json::json!({"success": true, "booking": booking})))
}

// POST /api/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let mut db = state.db()?;
        state.bookings.confirm_booking(&mut db, &id)?
    };
    Ok(Json(serde_json::json!({"success": true, "booking": booking})))
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub date: String,
    pub time: String,
}

// POST /api/bookings/:id/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<RescheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let mut db = state.db()?;
        state
            .bookings
            .reschedule_booking(&mut db, &id, &body.date, &body.time)?
    };
    Ok(Json(serde_json::json!({"success": true, "booking": booking})))
}
