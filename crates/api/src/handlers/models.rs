use std::collections::BTreeMap;

use axum::Json;
use serde::Serialize;

use qedit_core::preset::{PresetInfo, ALL_PRESETS};

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: BTreeMap<&'static str, PresetInfo>,
    pub note: &'static str,
}

/// GET /api/v1/models
pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: ALL_PRESETS.iter().map(|p| (p.as_str(), p.info())).collect(),
        note: "Switching models between generations will take several minutes for model loading",
    })
}
