use axum::Json;
use serde_json::{json, Value};

/// GET /
/// Service banner.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Stratagem business analysis API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Stratagem business analysis API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
