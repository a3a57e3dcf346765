//! HTTP client for a remote inference server.
//!
//! The server owns the GPU and exposes two endpoints:
//!
//! - `POST /load` with `{"preset", "weights"}` swaps the resident model.
//! - `POST /generate` with a multipart form (`image`, `prompt`,
//!   `negative_prompt`, `steps`, `cfg_scale`, `seed`) returns the edited
//!   image bytes.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use qedit_core::preset::Preset;

use crate::engine::{EngineError, GenerateRequest, InferenceEngine};

/// HTTP client for a single inference server.
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEngine {
    /// * `base_url` - e.g. `http://127.0.0.1:8188`, without a trailing slash.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ensure the response has a success status code, otherwise capture the
    /// status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceEngine for HttpEngine {
    async fn load(&self, preset: Preset) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "preset": preset.as_str(),
            "weights": preset.weights_file(),
        });

        let response = self
            .client
            .post(format!("{}/load", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<u8>, EngineError> {
        let form = Form::new()
            .part("image", Part::bytes(request.image.to_vec()).file_name("input"))
            .text("prompt", request.prompt.clone())
            .text("negative_prompt", request.negative_prompt.clone())
            .text("preset", request.preset.as_str())
            .text("steps", request.steps.to_string())
            .text("cfg_scale", request.cfg_scale.to_string())
            .text("seed", request.seed.to_string());

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
