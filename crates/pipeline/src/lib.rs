//! Inference side of the image-edit service.
//!
//! Bridges the queue's [`Processor`](qedit_queue::Processor) seam to a
//! single-model [`InferenceEngine`], handling model residency, prompt
//! composition, seed resolution and output persistence.

pub mod engine;
pub mod http;
pub mod processor;
pub mod storage;

pub use engine::{EngineError, GenerateRequest, InferenceEngine};
pub use http::HttpEngine;
pub use processor::{EngineProcessor, LoadOutcome, ModelStatus};
pub use storage::OutputStore;
