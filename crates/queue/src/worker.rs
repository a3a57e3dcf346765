//! The single sequential consumer.
//!
//! One loop per queue: wait for the FIFO head, hold the generate gate,
//! prepare (load gate + load deadline), process (generate deadline), record
//! the outcome, release. A failing or panicking processor fails the job,
//! never the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use qedit_core::job::{JobOutput, JobPayload};

use crate::deadline;
use crate::error::{Gate, Phase, ProcessError};
use crate::queue::{Claimed, JobQueue};

/// Pause before restarting a loop that died on an internal error.
pub(crate) const RESTART_DELAY: Duration = Duration::from_millis(500);

/// Run the worker loop, restarting it if it panics, until `cancel` fires.
pub(crate) async fn supervise(queue: Arc<JobQueue>, cancel: CancellationToken) {
    tracing::info!("Worker started");
    loop {
        let handle = tokio::spawn(run(Arc::clone(&queue), cancel.clone()));
        match handle.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                let reason = panic_message(e.into_panic().as_ref());
                tracing::error!(error = %reason, "Worker loop panicked");
                queue
                    .recover_in_flight(&format!("Worker internal error: {reason}"))
                    .await;
                if cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RESTART_DELAY) => {
                        tracing::warn!("Restarting worker loop");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Worker loop task cancelled");
                break;
            }
        }
    }
    tracing::info!("Worker stopped");
}

async fn run(queue: Arc<JobQueue>, cancel: CancellationToken) {
    loop {
        let claimed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            claimed = queue.next_job() => claimed,
        };
        drain_one(&queue, claimed).await;
    }
}

async fn drain_one(queue: &JobQueue, claimed: Claimed) {
    let Claimed { id, payload } = claimed;
    tracing::info!(
        job_id = %id,
        model = %payload.preset,
        instruction = %truncate(&payload.instruction, 50),
        "Processing job"
    );

    let generate_permit = queue.guard().acquire(Gate::Generate).await;
    let outcome = execute(queue, &payload).await;
    queue.finish(id, outcome).await;
    generate_permit.release();
}

async fn execute(queue: &JobQueue, payload: &JobPayload) -> Result<JobOutput, ProcessError> {
    let config = queue.config();
    let processor = queue.processor();

    {
        let _load_permit = queue.guard().acquire(Gate::Load).await;
        deadline::run(
            Phase::Load,
            config.load_timeout,
            catch_panic(processor.prepare(payload)),
        )
        .await?;
    }

    deadline::run(
        Phase::Generate,
        config.generate_timeout,
        catch_panic(processor.process(payload)),
    )
    .await
}

/// Turn a panic inside the processor into an ordinary failure.
async fn catch_panic<T, F>(fut: F) -> Result<T, ProcessError>
where
    F: std::future::Future<Output = Result<T, ProcessError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(ProcessError::Failed(format!(
            "Processor panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
