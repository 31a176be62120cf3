pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::analysis::handlers;
use crate::state::AppState;

/// Every route the service exposes, with its methods. Served by `/api/routes`.
const ROUTES: &[(&str, &[&str])] = &[
    ("/", &["GET"]),
    ("/api/routes", &["GET"]),
    ("/api/health", &["GET"]),
    ("/api/generate-questions", &["POST"]),
    ("/api/generate-swot", &["POST"]),
    ("/api/generate-action-plan", &["POST"]),
    ("/api/download-pdf/:pdf_id", &["GET"]),
];

/// GET /api/routes
async fn list_routes() -> Json<Value> {
    let routes: Vec<Value> = ROUTES
        .iter()
        .map(|(path, methods)| json!({ "path": path, "methods": methods }))
        .collect();
    Json(json!({ "routes": routes }))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(health::root_handler))
        .route("/api/routes", get(list_routes))
        .route("/api/health", get(health::health_handler))
        // Analysis API
        .route(
            "/api/generate-questions",
            post(handlers::handle_generate_questions),
        )
        .route("/api/generate-swot", post(handlers::handle_generate_swot))
        .route(
            "/api/generate-action-plan",
            post(handlers::handle_generate_action_plan),
        )
        .route(
            "/api/download-pdf/:pdf_id",
            get(handlers::handle_download_pdf),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
