use std::sync::Arc;

use qedit_core::prompt_filter::PromptFilter;
use qedit_pipeline::{EngineProcessor, InferenceEngine};
use qedit_queue::JobQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The job queue. Its worker is started and stopped by the binary.
    pub queue: Arc<JobQueue>,
    /// Model residency and output persistence, shared with the queue worker.
    pub processor: Arc<EngineProcessor>,
    /// Compiled blocked-term filter.
    pub prompt_filter: Arc<PromptFilter>,
}

impl AppState {
    /// Wire the processor, queue and prompt filter around `engine`.
    pub fn new(config: ServerConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let processor = Arc::new(EngineProcessor::new(engine, config.output_dir.clone()));
        let queue = JobQueue::new(config.queue.clone(), processor.clone());
        let prompt_filter = Arc::new(PromptFilter::new(&config.prompt_filter));

        Self {
            config: Arc::new(config),
            queue,
            processor,
            prompt_filter,
        }
    }
}
