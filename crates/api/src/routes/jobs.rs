//! Route definitions for job submission and polling.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes merged at the `/api/v1` root.
///
/// ```text
/// POST /submit                   -> submit (body limited to `max_upload_bytes`)
/// GET  /status/{job_id}          -> get_status
/// GET  /status/{job_id}/result   -> get_result
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/submit",
            post(jobs::submit).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/status/{job_id}", get(jobs::get_status))
        .route("/status/{job_id}/result", get(jobs::get_result))
}
