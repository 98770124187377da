//! Job model and lifecycle state machine.
//!
//! ```text
//! queued ──► running ──► completed
//!   │           │   └──► failed
//!   └───────────┴──────► cancelled
//! ```
//!
//! Every mutation goes through a method on [`Job`] that checks the current
//! status first, so terminal states can never be left and nothing returns to
//! `queued`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hf_core::JobId;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// `completed`, `failed` and `cancelled` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = hf_core::Error;

    fn from_str(s: &str) -> hf_core::Result<Self> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(hf_core::Error::Validation(format!("unknown job status '{other}'"))),
        }
    }
}

/// What a caller supplies when submitting a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Source location handed to the prober and combiner.
    pub input_url: String,
    /// Caller correlation key, stored verbatim.
    pub device_id: Option<String>,
    /// Media item correlation key, stored verbatim.
    pub item_id: Option<String>,
}

impl SubmitRequest {
    pub fn new(input_url: impl Into<String>) -> Self {
        Self {
            input_url: input_url.into(),
            ..Self::default()
        }
    }

    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }
}

/// A unit of work. Values handed out by the orchestrator are point-in-time
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Percentage; `[0, 99.9]` while running, 100 once completed.
    pub progress: f64,
    /// Last observed speed multiplier.
    pub speed: Option<f64>,
    pub input_url: String,
    pub output_path: PathBuf,
    /// Probed source duration in seconds.
    pub duration: Option<f64>,
    pub device_id: Option<String>,
    pub item_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Artifact size, set only on successful completion.
    pub size_bytes: Option<u64>,
    /// Failure description for `failed` jobs.
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn new(id: JobId, request: SubmitRequest, output_path: PathBuf) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0.0,
            speed: None,
            input_url: request.input_url,
            output_path,
            duration: None,
            device_id: request.device_id,
            item_id: request.item_id,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            size_bytes: None,
            error: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::debug!(
                job_id = %self.id,
                from = %self.status,
                to = %next,
                "Ignoring invalid job transition"
            );
            return false;
        }
        self.status = next;
        true
    }

    /// `queued → running`.
    pub(crate) fn start(&mut self) -> bool {
        if !self.transition(JobStatus::Running) {
            return false;
        }
        self.started_at = Some(Utc::now());
        true
    }

    /// Record the probed duration. Only meaningful while running.
    pub(crate) fn record_duration(&mut self, secs: f64) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.duration = Some(secs);
        true
    }

    /// Apply a parsed progress sample. Progress never regresses.
    pub(crate) fn record_progress(&mut self, progress: Option<f64>, speed: Option<f64>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        if let Some(p) = progress {
            self.progress = self.progress.max(p.clamp(0.0, hf_av::MAX_RUNNING_PROGRESS));
        }
        if speed.is_some() {
            self.speed = speed;
        }
        true
    }

    /// `running → completed`.
    pub(crate) fn complete(&mut self, size_bytes: Option<u64>) -> bool {
        if !self.transition(JobStatus::Completed) {
            return false;
        }
        self.progress = 100.0;
        self.size_bytes = size_bytes;
        self.finished_at = Some(Utc::now());
        true
    }

    /// `running → failed`.
    pub(crate) fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.transition(JobStatus::Failed) {
            return false;
        }
        self.progress = 0.0;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        true
    }

    /// `queued | running → cancelled`.
    pub(crate) fn cancel(&mut self) -> bool {
        if !self.transition(JobStatus::Cancelled) {
            return false;
        }
        self.finished_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            JobId::new(),
            SubmitRequest::new("http://media/master.m3u8").device_id("dev-1"),
            PathBuf::from("/cache/x.mp4"),
        )
    }

    #[test]
    fn new_job_is_queued() {
        let j = job();
        assert_eq!(j.status, JobStatus::Queued);
        assert_eq!(j.progress, 0.0);
        assert_eq!(j.device_id.as_deref(), Some("dev-1"));
        assert!(j.started_at.is_none());
    }

    #[test]
    fn happy_path() {
        let mut j = job();
        assert!(j.start());
        assert!(j.record_duration(60.0));
        assert!(j.record_progress(Some(50.0), Some(2.5)));
        assert!(j.complete(Some(1024)));
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.progress, 100.0);
        assert_eq!(j.speed, Some(2.5));
        assert_eq!(j.size_bytes, Some(1024));
        assert!(j.finished_at.is_some());
    }

    #[test]
    fn failure_resets_progress() {
        let mut j = job();
        j.start();
        j.record_progress(Some(40.0), None);
        assert!(j.fail("CombineFailed: exit status 1"));
        assert_eq!(j.progress, 0.0);
        assert_eq!(j.error.as_deref(), Some("CombineFailed: exit status 1"));
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut j = job();
        j.start();
        j.record_progress(Some(30.0), None);
        j.record_progress(Some(10.0), Some(1.0));
        assert_eq!(j.progress, 30.0);
        assert_eq!(j.speed, Some(1.0));
        j.record_progress(Some(150.0), None);
        assert_eq!(j.progress, hf_av::MAX_RUNNING_PROGRESS);
        // Speed-only sample keeps progress.
        j.record_progress(None, Some(3.0));
        assert_eq!(j.progress, hf_av::MAX_RUNNING_PROGRESS);
    }

    #[test]
    fn progress_ignored_unless_running() {
        let mut j = job();
        assert!(!j.record_progress(Some(10.0), Some(1.0)));
        assert!(!j.record_duration(10.0));
        assert_eq!(j.progress, 0.0);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut completed = job();
        completed.start();
        completed.complete(None);
        assert!(!completed.cancel());
        assert!(!completed.fail("late"));
        assert!(!completed.start());
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, 100.0);

        let mut cancelled = job();
        assert!(cancelled.cancel());
        assert!(!cancelled.start());
        assert!(!cancelled.complete(Some(1)));
        assert_eq!(cancelled.status, JobStatus::Cancelled);
    }

    #[test]
    fn queued_cannot_complete_directly() {
        let mut j = job();
        assert!(!j.complete(None));
        assert!(!j.fail("nope"));
        assert_eq!(j.status, JobStatus::Queued);
    }

    #[test]
    fn transition_table() {
        use JobStatus::*;
        let all = [Queued, Running, Completed, Failed, Cancelled];
        for from in all {
            for to in all {
                let allowed = from.can_transition_to(to);
                if from.is_terminal() || to == Queued {
                    assert!(!allowed, "{from} -> {to} must be rejected");
                }
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in ["queued", "running", "completed", "failed", "cancelled"] {
            assert_eq!(s.parse::<JobStatus>().unwrap().as_str(), s);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let j = job();
        let json = serde_json::to_value(&j).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["inputUrl"], "http://media/master.m3u8");
        assert_eq!(json["deviceId"], "dev-1");
        assert!(json["sizeBytes"].is_null());
    }
}
