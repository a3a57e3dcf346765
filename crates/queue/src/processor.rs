//! The seam between the queue and the inference engine.

use async_trait::async_trait;
use qedit_core::job::{JobOutput, JobPayload};

use crate::error::ProcessError;

/// Executes one job against the scarce resource.
///
/// Supplied at startup. The worker loop calls [`prepare`](Self::prepare)
/// under the load gate and load deadline, then [`process`](Self::process)
/// under the generate deadline, holding the generate gate for both. Errors
/// and panics from either call become a failed job.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Make the resource ready for `payload`, e.g. load its preset.
    async fn prepare(&self, _payload: &JobPayload) -> Result<(), ProcessError> {
        Ok(())
    }

    async fn process(&self, payload: &JobPayload) -> Result<JobOutput, ProcessError>;
}
