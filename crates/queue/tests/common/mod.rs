//! Shared fixtures for queue integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qedit_core::job::{JobId, JobOutput, JobPayload, JobStatus};
use qedit_core::preset::Preset;
use qedit_queue::{JobQueue, JobView, ProcessError, Processor, QueueConfig, QueueError};
use tokio::sync::Semaphore;

/// Fake processor driven by the instruction text:
///
/// - `fail...`      -> returns an error
/// - `panic...`     -> panics inside `process`
/// - `hang`         -> `process` never returns
/// - `hang-load`    -> `prepare` never returns
/// - anything else  -> completes with `out/<instruction>.png`
///
/// With [`TestProcessor::held`], every `process` call waits for a permit
/// released by the test via [`TestProcessor::release`].
#[derive(Default)]
pub struct TestProcessor {
    hold: Option<Semaphore>,
    started: Mutex<Vec<String>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl TestProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn held() -> Arc<Self> {
        Arc::new(Self {
            hold: Some(Semaphore::new(0)),
            ..Default::default()
        })
    }

    /// Let `n` held jobs finish.
    pub fn release(&self, n: usize) {
        if let Some(hold) = &self.hold {
            hold.add_permits(n);
        }
    }

    /// Instructions in the order `process` was entered.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for TestProcessor {
    async fn prepare(&self, payload: &JobPayload) -> Result<(), ProcessError> {
        if payload.instruction == "hang-load" {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn process(&self, payload: &JobPayload) -> Result<JobOutput, ProcessError> {
        self.started.lock().unwrap().push(payload.instruction.clone());
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.acquire().await.expect("hold semaphore closed").forget();
        }
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let instruction = payload.instruction.as_str();
        if instruction.starts_with("fail") {
            return Err(ProcessError::failed("engine exploded"));
        }
        if instruction.starts_with("panic") {
            panic!("processor blew up on {instruction}");
        }
        if instruction == "hang" {
            std::future::pending::<()>().await;
        }

        Ok(JobOutput {
            result_path: format!("out/{instruction}.png").into(),
            seed: payload.seed.unwrap_or(42),
        })
    }
}

pub fn payload(instruction: &str) -> JobPayload {
    JobPayload {
        image: Arc::from(vec![0x89u8, b'P', b'N', b'G']),
        instruction: instruction.to_string(),
        system_prompt: None,
        seed: None,
        preset: Preset::FourStep,
    }
}

pub fn config(max_size: usize) -> QueueConfig {
    QueueConfig {
        max_size,
        ..Default::default()
    }
}

pub fn queue(config: QueueConfig, processor: Arc<TestProcessor>) -> Arc<JobQueue> {
    JobQueue::new(config, processor)
}

/// Poll `get` until `check` holds, panicking after 5 seconds.
pub async fn wait_for<F>(queue: &JobQueue, id: JobId, mut check: F) -> Result<JobView, QueueError>
where
    F: FnMut(&Result<JobView, QueueError>) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = queue.get(id).await;
        if check(&current) {
            return current;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting on job {id}; last observation: {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_for_status(queue: &JobQueue, id: JobId, status: JobStatus) -> JobView {
    wait_for(queue, id, |r| matches!(r, Ok(v) if v.status == status))
        .await
        .expect("job should be visible")
}
