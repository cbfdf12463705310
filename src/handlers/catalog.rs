use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::handlers::JsonBody;
use crate::models::NewService;
use crate::services::catalog;
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let services = {
        let db = state.db()?;
        catalog::list_services(&db)?
    };
    Ok(Json(serde_json::json!({"success": true, "services": services})))
}

// POST /api/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewService>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = {
        let mut db = state.db()?;
        catalog::create_service(&mut db, body)?
    };
    Ok(Json(serde_json::json!({"success": true, "service": service})))
}
