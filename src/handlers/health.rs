// src/handlers/health.rs

use axum::{Json, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

pub async fn ping() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "pong",
        "timestamp": Utc::now(),
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
