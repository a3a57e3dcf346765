//! Administrative model switch.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use qedit_core::preset::Preset;
use qedit_queue::{deadline, Phase, ProcessError};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WarmupParams {
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WarmupResponse {
    pub status: &'static str,
    pub message: String,
    pub model: Preset,
    pub load_time_seconds: f64,
    pub cached: bool,
}

/// POST /api/v1/warmup?model=4-step
///
/// Loads a preset ahead of time. Fails fast with 503 if the worker is
/// currently loading or generating; never waits behind it. Not subject to
/// the request timeout: a load is bounded by the queue's load deadline.
pub async fn warmup(
    State(state): State<AppState>,
    _key: ApiKey,
    Query(params): Query<WarmupParams>,
) -> AppResult<Json<WarmupResponse>> {
    let preset = match params.model.as_deref().map(str::trim) {
        None | Some("") => Preset::default(),
        Some(name) => name.parse()?,
    };

    let exclusive = state.queue.guard().try_acquire_exclusive().map_err(|e| {
        tracing::info!(model = %preset, error = %e, "Warmup rejected: resource busy");
        e
    })?;

    // The load runs in its own task so a dropped request cannot abandon a
    // half-swapped model. The permit travels with it.
    let processor = state.processor.clone();
    let load_timeout = state.config.queue.load_timeout;
    let load = tokio::spawn(async move {
        let _exclusive = exclusive;
        deadline::run(Phase::Load, load_timeout, async {
            processor
                .load_preset(preset)
                .await
                .map_err(|e| ProcessError::failed(e.to_string()))
        })
        .await
    });

    let outcome = load
        .await
        .map_err(|e| AppError::InternalError(format!("Warmup task failed: {e}")))??;

    let load_time_seconds = (outcome.elapsed.as_secs_f64() * 100.0).round() / 100.0;
    tracing::info!(
        model = %preset,
        cached = outcome.cached,
        load_time_seconds,
        "Warmup complete"
    );

    Ok(Json(WarmupResponse {
        status: "success",
        message: format!("Model {preset} warmed up and ready"),
        model: preset,
        load_time_seconds,
        cached: outcome.cached,
    }))
}
