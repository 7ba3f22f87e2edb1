// ABOUTME: Liveness endpoint

use axum::Json;
use serde_json::{json, Value};

/// GET /up
pub async fn up() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
