//! Handlers for job submission, status polling and result download.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use qedit_core::error::CoreError;
use qedit_core::image_format::{self, ImageKind};
use qedit_core::job::{JobId, JobPayload, JobStatus};
use qedit_core::preset::Preset;
use qedit_core::types::Seed;
use qedit_queue::JobView;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::ApiKey;
use crate::state::AppState;

/// Response body for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub position: usize,
    pub message: String,
}

/// Raw multipart fields before validation.
#[derive(Debug, Default)]
struct SubmitForm {
    image: Option<Vec<u8>>,
    instruction: Option<String>,
    model: Option<String>,
    seed: Option<String>,
    system_prompt: Option<String>,
}

impl SubmitForm {
    async fn read(multipart: &mut Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "image" => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.image = Some(data.to_vec());
                }
                "instruction" | "model" | "seed" | "system_prompt" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    let slot = match name.as_str() {
                        "instruction" => &mut form.instruction,
                        "model" => &mut form.model,
                        "seed" => &mut form.seed,
                        _ => &mut form.system_prompt,
                    };
                    *slot = Some(text);
                }
                _ => {} // ignore unknown fields
            }
        }
        Ok(form)
    }

    fn into_payload(self, state: &AppState) -> AppResult<JobPayload> {
        let image = self
            .image
            .ok_or_else(|| AppError::BadRequest("Missing required 'image' field".into()))?;
        image_format::sniff(&image)?;

        let instruction = self
            .instruction
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing required 'instruction' field".into()))?;

        let system_prompt = self.system_prompt.filter(|s| !s.trim().is_empty());

        let preset = match self.model.as_deref().map(str::trim) {
            None | Some("") => Preset::default(),
            Some(name) => name.parse()?,
        };

        let seed = match self.seed.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Seed>().map_err(|_| {
                AppError::BadRequest(format!(
                    "Invalid seed: {raw}. Must be a non-negative integer"
                ))
            })?),
        };

        state
            .prompt_filter
            .validate(&instruction, system_prompt.as_deref())?;

        Ok(JobPayload {
            image: Arc::from(image),
            instruction,
            system_prompt,
            seed,
            preset,
        })
    }
}

/// POST /api/v1/submit
///
/// Multipart fields: `image` (PNG or JPEG, required), `instruction`
/// (required), `model`, `seed`, `system_prompt`. Returns immediately with
/// the job id and queue position; poll `/status/{job_id}` for the outcome.
pub async fn submit(
    State(state): State<AppState>,
    _key: ApiKey,
    mut multipart: Multipart,
) -> AppResult<Json<SubmitResponse>> {
    let payload = SubmitForm::read(&mut multipart)
        .await?
        .into_payload(&state)?;
    let model = payload.preset;

    let submitted = state.queue.submit(payload).await?;
    tracing::info!(
        job_id = %submitted.job_id,
        position = submitted.position,
        model = %model,
        "Submission accepted"
    );

    Ok(Json(SubmitResponse {
        job_id: submitted.job_id,
        status: JobStatus::Queued,
        position: submitted.position,
        message: format!("Job queued at position {}", submitted.position),
    }))
}

/// GET /api/v1/status/{job_id}
pub async fn get_status(
    State(state): State<AppState>,
    _key: ApiKey,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobView>> {
    let id: JobId = job_id.parse()?;
    Ok(Json(state.queue.get(id).await?))
}

/// GET /api/v1/status/{job_id}/result
///
/// Streams the output PNG of a completed job; 404 otherwise.
pub async fn get_result(
    State(state): State<AppState>,
    _key: ApiKey,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let id: JobId = job_id.parse()?;
    let view = state.queue.get(id).await?;

    let not_ready = || {
        AppError::Core(CoreError::NotFound {
            entity: "Result",
            id: id.to_string(),
        })
    };
    let (Some(path), Some(seed)) = (view.result_path.as_ref(), view.result_seed) else {
        return Err(not_ready());
    };
    if view.status != JobStatus::Completed {
        return Err(not_ready());
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(job_id = %id, path = %path.display(), "Result file missing");
            return Err(not_ready());
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("result.png");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static(ImageKind::Png.mime_type())),
            (HeaderName::from_static("x-seed"), HeaderValue::from(seed)),
            (
                HeaderName::from_static("x-model"),
                HeaderValue::from_static(view.model.as_str()),
            ),
            (CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
