//! Bounded job queue and resource guard for single-GPU image editing.
//!
//! Many HTTP handlers submit and poll concurrently; one worker loop drains
//! the queue strictly in FIFO order and hands each job to an injected
//! [`Processor`](processor::Processor). Terminal jobs are kept for a
//! configurable retention period and then reaped.
//!
//! ```text
//! submit -> admission -> pending FIFO -> worker -> ResourceGuard -> Processor
//!                                                    |
//!                           get / summary <- job map <- reaper evicts
//! ```

pub mod config;
pub mod deadline;
pub mod error;
pub mod guard;
pub mod job;
pub mod processor;
pub mod queue;
mod reaper;
mod worker;

pub use config::QueueConfig;
pub use error::{Gate, Phase, ProcessError, QueueError};
pub use guard::ResourceGuard;
pub use job::{Job, JobState, JobView};
pub use processor::Processor;
pub use queue::{JobQueue, QueueSummary, Submitted};
