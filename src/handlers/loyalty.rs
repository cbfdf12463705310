use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::services::loyalty;
use crate::state::AppState;

// GET /api/loyalty
pub async fn list_loyalty(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let accounts = {
        let db = state.db()?;
        loyalty::list_loyalty(&db)?
    };
    Ok(Json(serde_json::json!({"success": true, "loyalty": accounts})))
}

// GET /api/loyalty/:customer
pub async fn get_loyalty(
    State(state): State<Arc<AppState>>,
    Path(customer): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let account = {
        let db = state.db()?;
        loyalty::get_loyalty(&db, &customer)?
    };
    Ok(Json(serde_json::json!({"success": true, "loyalty": account})))
}
