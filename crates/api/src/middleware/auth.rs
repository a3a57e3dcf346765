//! API key authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use qedit_core::api_keys::verify_api_key;
use qedit_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried a valid `X-API-Key` header.
///
/// Add it as an extractor parameter to any handler that requires a key:
///
/// ```ignore
/// async fn my_handler(_key: ApiKey) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-API-Key header".into()))
            })?;

        if !verify_api_key(presented, &state.config.api_key_hash) {
            tracing::warn!("Rejected request with invalid API key");
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid or missing API key".into(),
            )));
        }

        Ok(ApiKey)
    }
}
