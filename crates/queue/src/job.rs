//! The mutable job record and its read-only projection.

use std::path::PathBuf;

use serde::Serialize;

use qedit_core::job::{state_machine, JobId, JobOutput, JobPayload, JobStatus};
use qedit_core::preset::Preset;
use qedit_core::types::{Seed, Timestamp};

use crate::error::ProcessError;

/// Lifecycle state. Outcome data lives only on the variant that owns it, so
/// a failed job can never carry a result and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Processing,
    Completed(JobOutput),
    Failed(ProcessError),
    /// Reserved; nothing currently produces it.
    Cancelled,
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Queued => JobStatus::Queued,
            Self::Processing => JobStatus::Processing,
            Self::Completed(_) => JobStatus::Completed,
            Self::Failed(_) => JobStatus::Failed,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// One submitted unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    payload: JobPayload,
    state: JobState,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
}

impl Job {
    pub fn new(id: JobId, payload: JobPayload, now: Timestamp) -> Self {
        Self {
            id,
            payload,
            state: JobState::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    /// When the job reached a terminal state, if it has.
    pub fn finished_at(&self) -> Option<Timestamp> {
        if self.status().is_terminal() {
            Some(self.completed_at.unwrap_or(self.created_at))
        } else {
            None
        }
    }

    fn transition(&mut self, next: JobState) -> Result<(), String> {
        state_machine::validate_transition(self.status(), next.status())?;
        self.state = next;
        Ok(())
    }

    /// `queued -> processing`. Timestamps never run backwards.
    pub fn start(&mut self, now: Timestamp) -> Result<(), String> {
        self.transition(JobState::Processing)?;
        self.started_at = Some(now.max(self.created_at));
        Ok(())
    }

    /// `processing -> completed | failed`.
    pub fn finish(
        &mut self,
        outcome: Result<JobOutput, ProcessError>,
        now: Timestamp,
    ) -> Result<(), String> {
        let next = match outcome {
            Ok(output) => JobState::Completed(output),
            Err(err) => JobState::Failed(err),
        };
        self.transition(next)?;
        let floor = self.started_at.unwrap_or(self.created_at);
        self.completed_at = Some(now.max(floor));
        Ok(())
    }

    /// Project into the public view. `position` is the current 1-based
    /// place in the pending FIFO, supplied by the queue at read time.
    pub fn view(&self, position: Option<usize>) -> JobView {
        let (result_path, result_seed, error) = match &self.state {
            JobState::Completed(out) => (Some(out.result_path.clone()), Some(out.seed), None),
            JobState::Failed(err) => (None, None, Some(err.to_string())),
            _ => (None, None, None),
        };

        JobView {
            job_id: self.id,
            status: self.status(),
            instruction: self.payload.instruction.clone(),
            model: self.payload.preset,
            seed: self.payload.seed,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            position: position.filter(|_| self.status() == JobStatus::Queued),
            result_path,
            result_seed,
            error,
        }
    }
}

/// Read-only snapshot of a job returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub instruction: String,
    pub model: Preset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<Seed>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_seed: Option<Seed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::Phase;

    fn payload() -> JobPayload {
        JobPayload {
            image: Arc::from(vec![1u8, 2, 3]),
            instruction: "add a hat".into(),
            system_prompt: None,
            seed: Some(7),
            preset: Preset::EightStep,
        }
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn new_job_is_queued_without_outcome() {
        let job = Job::new(JobId::new(), payload(), at(0));
        let view = job.view(Some(3));

        assert_eq!(view.status, JobStatus::Queued);
        assert_eq!(view.position, Some(3));
        assert!(view.result_path.is_none());
        assert!(view.error.is_none());
        assert!(job.finished_at().is_none());
    }

    #[test]
    fn completed_job_exposes_result_only() {
        let mut job = Job::new(JobId::new(), payload(), at(0));
        job.start(at(5)).unwrap();
        let output = JobOutput {
            result_path: "out/qwen08-api_001.png".into(),
            seed: 99,
        };
        job.finish(Ok(output), at(9)).unwrap();

        let view = job.view(Some(1));
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.result_seed, Some(99));
        assert!(view.error.is_none());
        assert!(view.position.is_none(), "position only applies while queued");
        assert_eq!(job.finished_at(), Some(at(9)));
    }

    #[test]
    fn failed_job_exposes_error_only() {
        let mut job = Job::new(JobId::new(), payload(), at(0));
        job.start(at(1)).unwrap();
        job.finish(
            Err(ProcessError::Timeout {
                phase: Phase::Generate,
                after: Duration::from_secs(600),
            }),
            at(2),
        )
        .unwrap();

        let view = job.view(None);
        assert_eq!(view.status, JobStatus::Failed);
        assert!(view.result_path.is_none());
        assert_eq!(view.error.as_deref(), Some("Generation timed out after 600s"));
    }

    #[test]
    fn timestamps_never_precede_earlier_transitions() {
        let mut job = Job::new(JobId::new(), payload(), at(10));
        job.start(at(5)).unwrap();
        assert_eq!(job.started_at(), Some(at(10)));

        job.finish(Err(ProcessError::failed("boom")), at(3)).unwrap();
        assert_eq!(job.completed_at(), Some(at(10)));
    }

    #[test]
    fn cannot_finish_a_queued_job() {
        let mut job = Job::new(JobId::new(), payload(), at(0));
        let err = job.finish(Err(ProcessError::failed("x")), at(1)).unwrap_err();
        assert_eq!(err, "Invalid transition: queued -> failed");
        assert_eq!(job.status(), JobStatus::Queued);
        assert!(job.completed_at().is_none());
    }

    #[test]
    fn cannot_start_twice() {
        let mut job = Job::new(JobId::new(), payload(), at(0));
        job.start(at(1)).unwrap();
        assert!(job.start(at(2)).is_err());
    }

    #[test]
    fn view_serializes_wire_names() {
        let job = Job::new(JobId::new(), payload(), at(0));
        let json = serde_json::to_value(job.view(Some(2))).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["model"], "8-step");
        assert_eq!(json["position"], 2);
        assert!(json.get("error").is_none());
    }
}
