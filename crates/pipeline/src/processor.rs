//! [`Processor`] implementation backed by an [`InferenceEngine`].
//!
//! Keeps track of which preset is resident so `prepare` only reloads when
//! a job asks for a different one. `process` composes the prompt, resolves
//! the seed, calls the engine and persists the output as PNG.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tokio::sync::RwLock;

use qedit_core::job::{JobOutput, JobPayload};
use qedit_core::preset::Preset;
use qedit_core::prompt::{build_prompt, NEGATIVE_PROMPT};
use qedit_core::types::Seed;
use qedit_queue::{ProcessError, Processor};

use crate::engine::{EngineError, GenerateRequest, InferenceEngine};
use crate::storage::{ensure_png, OutputStore};

/// Snapshot of the resident model, as reported by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModelStatus {
    pub current_model: Option<Preset>,
    pub model_loaded: bool,
}

/// Result of [`EngineProcessor::load_preset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOutcome {
    pub preset: Preset,
    /// The preset was already resident; nothing was loaded.
    pub cached: bool,
    pub elapsed: Duration,
}

pub struct EngineProcessor {
    engine: Arc<dyn InferenceEngine>,
    store: OutputStore,
    resident: RwLock<Option<Preset>>,
}

impl EngineProcessor {
    pub fn new(engine: Arc<dyn InferenceEngine>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            store: OutputStore::new(output_dir),
            resident: RwLock::new(None),
        }
    }

    pub fn output_dir(&self) -> &std::path::Path {
        self.store.dir()
    }

    pub async fn model_status(&self) -> ModelStatus {
        let current = *self.resident.read().await;
        ModelStatus {
            current_model: current,
            model_loaded: current.is_some(),
        }
    }

    /// Make `preset` resident. Callers must hold the load gate.
    ///
    /// While a different model is being swapped in nothing is reported as
    /// loaded; a failed load leaves no model resident.
    pub async fn load_preset(&self, preset: Preset) -> Result<LoadOutcome, EngineError> {
        let started = Instant::now();
        if *self.resident.read().await == Some(preset) {
            tracing::debug!(model = %preset, "Model already loaded (cached)");
            return Ok(LoadOutcome {
                preset,
                cached: true,
                elapsed: started.elapsed(),
            });
        }

        let previous = self.resident.write().await.take();
        tracing::info!(
            model = %preset,
            previous = previous.map(Preset::as_str),
            weights = %preset.weights_file(),
            "Loading model"
        );

        self.engine.load(preset).await?;
        *self.resident.write().await = Some(preset);

        let elapsed = started.elapsed();
        tracing::info!(
            model = %preset,
            elapsed_secs = elapsed.as_secs_f64(),
            "Model loaded"
        );
        Ok(LoadOutcome {
            preset,
            cached: false,
            elapsed,
        })
    }

    async fn run(&self, payload: &JobPayload) -> Result<JobOutput, EngineError> {
        let preset = payload.preset;
        if *self.resident.read().await != Some(preset) {
            return Err(EngineError::NotLoaded(preset));
        }

        let info = preset.info();
        let seed = payload.seed.unwrap_or_else(random_seed);
        let request = GenerateRequest {
            image: Arc::clone(&payload.image),
            prompt: build_prompt(&payload.instruction, payload.system_prompt.as_deref()),
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            preset,
            steps: info.steps,
            cfg_scale: info.cfg_scale,
            seed,
        };
        tracing::debug!(
            model = %preset,
            steps = info.steps,
            seed,
            prompt = %request.prompt,
            "Starting inference"
        );

        let started = Instant::now();
        let bytes = self.engine.generate(&request).await?;
        let png = ensure_png(bytes)?;
        let result_path = self.store.save(preset.file_prefix(), &png).await?;
        tracing::info!(
            model = %preset,
            seed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            path = %result_path.display(),
            "Inference completed"
        );

        Ok(JobOutput { result_path, seed })
    }
}

/// Uniform over `0..=u32::MAX`.
fn random_seed() -> Seed {
    Seed::from(rand::rng().random::<u32>())
}

#[async_trait]
impl Processor for EngineProcessor {
    async fn prepare(&self, payload: &JobPayload) -> Result<(), ProcessError> {
        self.load_preset(payload.preset)
            .await
            .map(|_| ())
            .map_err(|e| ProcessError::failed(e.to_string()))
    }

    async fn process(&self, payload: &JobPayload) -> Result<JobOutput, ProcessError> {
        self.run(payload)
            .await
            .map_err(|e| ProcessError::failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_seed_fits_in_u32() {
        for _ in 0..100 {
            assert!(random_seed() <= Seed::from(u32::MAX));
        }
    }
}
