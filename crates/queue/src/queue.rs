//! The queue facade: admission control, FIFO bookkeeping and the job map.
//!
//! All shared state sits behind one lock. `submit`, `get` and `summary`
//! only hold it for a short critical section; the worker takes it to
//! dequeue and to record outcomes, the reaper to evict.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use qedit_core::job::{JobId, JobOutput, JobPayload, JobStatus};
use qedit_core::types::Timestamp;

use crate::config::QueueConfig;
use crate::error::{ProcessError, QueueError};
use crate::guard::ResourceGuard;
use crate::job::{Job, JobView};
use crate::processor::Processor;
use crate::{reaper, worker};

/// Result of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub job_id: JobId,
    /// 1-based place in the pending FIFO at submission time.
    pub position: usize,
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    /// Jobs waiting in the pending FIFO.
    pub queue_size: usize,
    pub max_size: usize,
    pub queued_count: usize,
    pub processing_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
    pub current_job_id: Option<JobId>,
    /// All retained job records, terminal ones included.
    pub total_jobs: usize,
}

/// A job handed to the worker loop.
#[derive(Debug, Clone)]
pub(crate) struct Claimed {
    pub id: JobId,
    pub payload: JobPayload,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, Job>,
    in_flight: Option<JobId>,
}

impl QueueState {
    /// Queued plus processing.
    fn active_count(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }

    fn position(&self, id: JobId) -> Option<usize> {
        self.pending.iter().position(|p| *p == id).map(|i| i + 1)
    }

    /// Pop the FIFO head and mark it processing.
    ///
    /// Panics on a corrupted queue: a second in-flight job or a pending id
    /// with no queued record. The head is only popped once every check has
    /// passed, so a panic leaves it queued.
    fn claim_next(&mut self, now: Timestamp) -> Option<Claimed> {
        let id = *self.pending.front()?;
        assert!(
            self.in_flight.is_none(),
            "dequeued job {id} while job {:?} is still in flight",
            self.in_flight
        );
        let job = self
            .jobs
            .get_mut(&id)
            .unwrap_or_else(|| panic!("pending job {id} has no record in the job map"));
        if let Err(e) = job.start(now) {
            panic!("cannot start pending job {id}: {e}");
        }
        self.pending.pop_front();
        self.in_flight = Some(id);
        Some(Claimed {
            id,
            payload: job.payload().clone(),
        })
    }
}

fn is_expired(job: &Job, now: Timestamp, max_age: TimeDelta) -> bool {
    job.finished_at().is_some_and(|at| now - at > max_age)
}

struct Lifecycle {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    reaper: JoinHandle<()>,
}

/// The bounded job queue. Construct once at startup and share via `Arc`.
pub struct JobQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    work_ready: Notify,
    guard: Arc<ResourceGuard>,
    processor: Arc<dyn Processor>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl JobQueue {
    pub fn new(config: QueueConfig, processor: Arc<dyn Processor>) -> Arc<Self> {
        Self::with_guard(config, processor, Arc::new(ResourceGuard::new()))
    }

    /// Build a queue that shares an existing resource guard.
    pub fn with_guard(
        config: QueueConfig,
        processor: Arc<dyn Processor>,
        guard: Arc<ResourceGuard>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(QueueState::default()),
            work_ready: Notify::new(),
            guard,
            processor,
            lifecycle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn guard(&self) -> &Arc<ResourceGuard> {
        &self.guard
    }

    pub(crate) fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    fn retention(&self) -> TimeDelta {
        TimeDelta::from_std(self.config.cleanup_age).unwrap_or(TimeDelta::MAX)
    }

    // ---- public contract ----

    /// Admit a job if queued + processing is below `max_size`.
    pub async fn submit(&self, payload: JobPayload) -> Result<Submitted, QueueError> {
        let max_size = self.config.max_size;
        let (job_id, position, queue_size) = {
            let mut state = self.state.lock().await;
            if state.active_count() >= max_size {
                tracing::warn!(
                    max_size,
                    active = state.active_count(),
                    "Submission rejected: queue full"
                );
                return Err(QueueError::QueueFull { max_size });
            }

            let job_id = JobId::new();
            state.jobs.insert(job_id, Job::new(job_id, payload, Utc::now()));
            state.pending.push_back(job_id);
            (job_id, state.pending.len(), state.pending.len())
        };

        self.work_ready.notify_one();
        tracing::info!(
            job_id = %job_id,
            position,
            queue_size,
            "Job submitted"
        );

        Ok(Submitted { job_id, position })
    }

    /// Snapshot of one job, with its current queue position if queued.
    ///
    /// Finished jobs past the retention age are evicted here as well as by
    /// the reaper, so they are never observable after expiry.
    pub async fn get(&self, id: JobId) -> Result<JobView, QueueError> {
        let now = Utc::now();
        let max_age = self.retention();
        let mut state = self.state.lock().await;

        let expired = match state.jobs.get(&id) {
            Some(job) => is_expired(job, now, max_age),
            None => return Err(QueueError::NotFound(id)),
        };
        if expired {
            state.jobs.remove(&id);
            tracing::debug!(job_id = %id, "Expired job evicted on read");
            return Err(QueueError::NotFound(id));
        }

        let position = state.position(id);
        state
            .jobs
            .get(&id)
            .map(|job| job.view(position))
            .ok_or(QueueError::NotFound(id))
    }

    pub async fn summary(&self) -> QueueSummary {
        let state = self.state.lock().await;
        let mut summary = QueueSummary {
            queue_size: state.pending.len(),
            max_size: self.config.max_size,
            current_job_id: state.in_flight,
            total_jobs: state.jobs.len(),
            ..Default::default()
        };
        for job in state.jobs.values() {
            match job.status() {
                JobStatus::Queued => summary.queued_count += 1,
                JobStatus::Processing => summary.processing_count += 1,
                JobStatus::Completed => summary.completed_count += 1,
                JobStatus::Failed => summary.failed_count += 1,
                JobStatus::Cancelled => summary.cancelled_count += 1,
            }
        }
        summary
    }

    // ---- lifecycle ----

    /// Spawn the worker loop and the reaper. No-op if already running.
    pub async fn start(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            tracing::debug!("Job queue already running");
            return;
        }

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(worker::supervise(Arc::clone(self), cancel.clone()));
        let reaper = tokio::spawn(reaper::run(Arc::clone(self), cancel.clone()));
        *lifecycle = Some(Lifecycle {
            cancel,
            worker,
            reaper,
        });

        tracing::info!(
            max_size = self.config.max_size,
            cleanup_age_secs = self.config.cleanup_age.as_secs(),
            "Job queue started"
        );
    }

    /// Stop the worker and the reaper.
    ///
    /// A job already processing runs to completion (it is bounded by its
    /// deadlines); queued jobs stay queued until the next `start`.
    pub async fn stop(&self) {
        let Some(lifecycle) = self.lifecycle.lock().await.take() else {
            return;
        };
        lifecycle.cancel.cancel();

        if let Err(e) = lifecycle.worker.await {
            tracing::error!(error = %e, "Worker task ended abnormally");
        }
        if let Err(e) = lifecycle.reaper.await {
            tracing::error!(error = %e, "Reaper task ended abnormally");
        }
        tracing::info!("Job queue stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.is_some()
    }

    // ---- worker and reaper side ----

    /// Wait for the next pending job and mark it processing.
    ///
    /// Cancel-safe: a job is only dequeued in the same poll that returns it.
    pub(crate) async fn next_job(&self) -> Claimed {
        loop {
            if let Some(claimed) = self.state.lock().await.claim_next(Utc::now()) {
                return claimed;
            }
            self.work_ready.notified().await;
        }
    }

    /// Record the outcome of the in-flight job.
    pub(crate) async fn finish(&self, id: JobId, outcome: Result<JobOutput, ProcessError>) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        assert_eq!(
            state.in_flight,
            Some(id),
            "finishing job {id} which is not the in-flight job"
        );
        let job = state
            .jobs
            .get_mut(&id)
            .unwrap_or_else(|| panic!("in-flight job {id} has no record in the job map"));
        if let Err(e) = job.finish(outcome, Utc::now()) {
            panic!("cannot finish in-flight job {id}: {e}");
        }
        state.in_flight = None;

        match job.state() {
            crate::job::JobState::Completed(out) => tracing::info!(
                job_id = %id,
                result_path = %out.result_path.display(),
                seed = out.seed,
                "Job completed"
            ),
            crate::job::JobState::Failed(err) => tracing::warn!(
                job_id = %id,
                error = %err,
                timeout = err.is_timeout(),
                "Job failed"
            ),
            _ => {}
        }
    }

    /// Fail whatever job was in flight when the worker loop died.
    pub(crate) async fn recover_in_flight(&self, reason: &str) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(id) = state.in_flight.take() else {
            return;
        };
        if let Some(job) = state.jobs.get_mut(&id) {
            if job.status() == JobStatus::Processing
                && job.finish(Err(ProcessError::failed(reason)), Utc::now()).is_ok()
            {
                tracing::warn!(job_id = %id, reason, "In-flight job failed by worker recovery");
            }
        }
    }

    /// Evict finished jobs older than the retention age. Returns the number
    /// removed. Queued and processing jobs are never evicted.
    pub async fn reap_expired(&self, now: Timestamp) -> usize {
        let max_age = self.retention();
        let mut state = self.state.lock().await;
        let before = state.jobs.len();
        state.jobs.retain(|id, job| {
            let keep = !is_expired(job, now, max_age);
            if !keep {
                tracing::debug!(job_id = %id, status = %job.status(), "Reaped finished job");
            }
            keep
        });
        before - state.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::worker::RESTART_DELAY;

    fn payload() -> JobPayload {
        JobPayload {
            image: Arc::from(Vec::<u8>::new()),
            instruction: "x".into(),
            system_prompt: None,
            seed: None,
            preset: Default::default(),
        }
    }

    #[test]
    fn claim_next_pops_in_fifo_order() {
        let mut state = QueueState::default();
        let now = Utc::now();
        let a = JobId::new();
        let b = JobId::new();
        for id in [a, b] {
            state.jobs.insert(id, Job::new(id, payload(), now));
            state.pending.push_back(id);
        }

        let first = state.claim_next(now).unwrap();
        assert_eq!(first.id, a);
        assert_eq!(state.in_flight, Some(a));
        assert_eq!(state.position(b), Some(1));
        assert_eq!(state.active_count(), 2);
    }

    #[test]
    fn claim_next_on_empty_queue_is_none() {
        let mut state = QueueState::default();
        assert!(state.claim_next(Utc::now()).is_none());
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn double_dequeue_panics() {
        let mut state = QueueState::default();
        let now = Utc::now();
        for _ in 0..2 {
            let id = JobId::new();
            state.jobs.insert(id, Job::new(id, payload(), now));
            state.pending.push_back(id);
        }
        state.claim_next(now);
        state.claim_next(now);
    }

    #[test]
    #[should_panic(expected = "has no record")]
    fn pending_id_without_record_panics() {
        let mut state = QueueState::default();
        state.pending.push_back(JobId::new());
        state.claim_next(Utc::now());
    }

    #[test]
    fn failed_claim_leaves_the_head_queued() {
        let mut state = QueueState::default();
        let now = Utc::now();
        let stale = JobId::new();
        let next = JobId::new();
        state.in_flight = Some(stale);
        state.jobs.insert(next, Job::new(next, payload(), now));
        state.pending.push_back(next);

        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            state.claim_next(now);
        }));

        assert!(caught.is_err());
        assert_eq!(state.pending.front(), Some(&next));
        assert_eq!(state.jobs[&next].status(), JobStatus::Queued);
    }

    // -----------------------------------------------------------------------
    // Supervisor: a panicking loop fails the in-flight job and restarts
    // -----------------------------------------------------------------------

    struct Immediate;

    #[async_trait]
    impl Processor for Immediate {
        async fn process(&self, payload: &JobPayload) -> Result<JobOutput, ProcessError> {
            Ok(JobOutput {
                result_path: PathBuf::from(format!("/out/{}.png", payload.instruction)),
                seed: 1,
            })
        }
    }

    async fn wait_for(queue: &JobQueue, id: JobId, status: JobStatus) -> JobView {
        for _ in 0..5000 {
            let view = queue.get(id).await.unwrap();
            if view.status == status {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("job {id} never reached {status}");
    }

    #[tokio::test(start_paused = true)]
    async fn worker_restarts_after_an_internal_panic() {
        let queue = JobQueue::new(QueueConfig::default(), Arc::new(Immediate));

        // A job left in flight by a previous loop, then a normal one behind it.
        let stale = queue.submit(payload()).await.unwrap().job_id;
        queue.state.lock().await.claim_next(Utc::now()).unwrap();
        let next = queue.submit(payload()).await.unwrap().job_id;

        let started = tokio::time::Instant::now();
        queue.start().await;

        let failed = wait_for(&queue, stale, JobStatus::Failed).await;
        let error = failed.error.unwrap();
        assert!(error.starts_with("Worker internal error"), "{error}");
        assert!(error.contains("still in flight"), "{error}");
        assert!(failed.result_path.is_none());

        // The panicking claim did not consume the next job.
        assert_eq!(queue.get(next).await.unwrap().status, JobStatus::Queued);
        assert_eq!(queue.summary().await.current_job_id, None);

        wait_for(&queue, next, JobStatus::Completed).await;
        assert!(started.elapsed() >= RESTART_DELAY);

        let later = queue.submit(payload()).await.unwrap().job_id;
        wait_for(&queue, later, JobStatus::Completed).await;
        assert!(queue.is_running().await);

        queue.stop().await;
    }
}
