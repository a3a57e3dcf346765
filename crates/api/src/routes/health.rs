use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;

use qedit_core::preset::Preset;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Preset currently resident on the GPU, if any.
    pub current_model: Option<Preset>,
    pub model_loaded: bool,
    /// A model load holds the load gate right now.
    pub loading: bool,
    /// A generation holds the generate gate right now.
    pub generating: bool,
}

/// GET /health -- returns service and model status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.processor.model_status().await;
    let guard = state.queue.guard();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        current_model: model.current_model,
        model_loaded: model.model_loaded,
        loading: guard.is_loading(),
        generating: guard.is_generating(),
    })
}

/// GET / -- service name, version and the main endpoints.
async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Qwen Image Edit API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "submit": "POST /api/v1/submit",
            "status": "GET /api/v1/status/{job_id}",
            "result": "GET /api/v1/status/{job_id}/result",
            "queue": "GET /api/v1/queue",
            "models": "GET /api/v1/models",
            "warmup": "POST /api/v1/warmup",
            "health": "GET /api/v1/health",
        }
    }))
}

/// Health check route. Mounted both at the root and under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Root-level routes: service info plus the health check.
pub fn root_router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_info))
        .merge(router())
}
