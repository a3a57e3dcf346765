//! Handler for queue observability.

use axum::extract::State;
use axum::Json;
use qedit_queue::QueueSummary;

use crate::error::AppResult;
use crate::middleware::auth::ApiKey;
use crate::state::AppState;

/// GET /api/v1/queue
///
/// Point-in-time counters: pending size, capacity, per-state counts, the
/// in-flight job id and the number of retained records.
pub async fn get_queue_status(
    State(state): State<AppState>,
    _key: ApiKey,
) -> AppResult<Json<QueueSummary>> {
    Ok(Json(state.queue.summary().await))
}
