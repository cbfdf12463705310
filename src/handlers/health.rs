use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"success": true, "status": "ok"}))
}
