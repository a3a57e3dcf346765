//! The inference engine seam.
//!
//! The queue never talks to the GPU. The [`EngineProcessor`](crate::EngineProcessor)
//! drives an [`InferenceEngine`], which in production is the remote
//! [`HttpEngine`](crate::HttpEngine) and in tests an in-memory fake.

use std::sync::Arc;

use async_trait::async_trait;

use qedit_core::preset::Preset;
use qedit_core::types::Seed;

/// Everything the engine needs for one edit.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub image: Arc<[u8]>,
    pub prompt: String,
    pub negative_prompt: String,
    pub preset: Preset,
    pub steps: u32,
    pub cfg_scale: f32,
    pub seed: Seed,
}

/// Errors surfaced by an engine implementation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The inference server returned a non-2xx status code.
    #[error("Inference server error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A generate call arrived for a preset that is not resident.
    #[error("Model {0} is not loaded")]
    NotLoaded(Preset),

    /// The engine answered with bytes that are not a usable image.
    #[error("Invalid engine output: {0}")]
    InvalidOutput(String),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// A single-model inference backend.
///
/// Implementations may assume calls are serialized: the queue holds the
/// load gate around `load` and the generate gate around `generate`.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Make `preset` the resident model, evicting any other.
    async fn load(&self, preset: Preset) -> Result<(), EngineError>;

    /// Run one edit against the resident model, returning encoded image
    /// bytes (PNG or JPEG).
    async fn generate(&self, request: &GenerateRequest) -> Result<Vec<u8>, EngineError>;
}
