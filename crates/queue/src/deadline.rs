//! Deadline enforcement for resource-bound calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Phase, ProcessError};

/// Run `fut` under `limit`; expiry becomes [`ProcessError::Timeout`] for
/// `phase`.
pub async fn run<T, F>(phase: Phase, limit: Duration, fut: F) -> Result<T, ProcessError>
where
    F: Future<Output = Result<T, ProcessError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProcessError::Timeout {
            phase,
            after: limit,
        }),
    }
}
