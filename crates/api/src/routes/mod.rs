pub mod health;
pub mod jobs;
pub mod queue;

use axum::routing::{get, post};
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers;
use crate::router::request_timeout_layer;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                         service and model status (public)
/// /models                         list presets (public)
/// /warmup?model=                  preload a preset (POST, API key)
///
/// /submit                         submit an edit job (POST, multipart, API key)
/// /status/{job_id}                job status (API key)
/// /status/{job_id}/result         output image (API key)
///
/// /queue                          queue summary (API key)
/// ```
///
/// Everything except `/warmup` runs under the request timeout.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    let timed = Router::new()
        .merge(health::router())
        .route("/models", get(handlers::models::list_models))
        .merge(jobs::router(config.max_upload_bytes))
        .nest("/queue", queue::router())
        .layer(request_timeout_layer(config));

    Router::new()
        .route("/warmup", post(handlers::admin::warmup))
        .merge(timed)
}
