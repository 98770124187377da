//! Job orchestration façade.
//!
//! [`Orchestrator`] owns the registry, the admission backlog and the side
//! table of process handles behind a single lock. Every mutation, including
//! the admission pass that follows it, happens inside one critical section,
//! so the running count can never exceed the ceiling and a cancelled job can
//! never be admitted afterwards.
//!
//! Admitted jobs are supervised on spawned tasks. Each task reports back
//! through [`ProgressSink`] while running and calls `finish` exactly once when
//! it ends, whatever the exit path.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;

use hf_av::{CombineTemplate, DurationProber, ProgressSample};
use hf_core::{Error, JobId, Result};

use crate::cache;
use crate::job::{Job, JobStatus, SubmitRequest};
use crate::registry::{JobFilter, JobRegistry};
use crate::scheduler::AdmissionScheduler;
use crate::supervisor::{Outcome, ProcessHandle, ProcessSupervisor, ProgressSink, RunSpec};

/// Aggregate counters reported by [`Orchestrator::statistics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub cache_size_bytes: u64,
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub unique_devices: usize,
}

/// Result of [`Orchestrator::clear_cache`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearReport {
    pub files_removed: usize,
    pub bytes_freed: u64,
    pub files_kept: usize,
    pub jobs_retired: usize,
}

/// Result of [`Orchestrator::sweep_expired`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub jobs_retired: usize,
    pub files_removed: usize,
}

struct EngineState {
    registry: JobRegistry,
    scheduler: AdmissionScheduler,
    handles: HashMap<JobId, ProcessHandle>,
    accepting: bool,
}

/// A job that left the backlog and needs a supervisor task.
struct Launch {
    id: JobId,
    input_url: String,
    output_path: PathBuf,
    handle: ProcessHandle,
}

struct Inner {
    state: Mutex<EngineState>,
    supervisor: ProcessSupervisor,
    cache_dir: PathBuf,
    runtime: Handle,
}

/// Entry point to the job engine. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build an orchestrator writing artifacts under `cache_dir`.
    ///
    /// Must be called from within a tokio runtime; supervisor tasks are
    /// spawned onto that runtime. Creates `cache_dir` if needed.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        ceiling: usize,
        prober: Arc<dyn DurationProber>,
        template: Arc<dyn CombineTemplate>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;

        let runtime = Handle::try_current().map_err(|e| {
            Error::Internal(format!("orchestrator needs a tokio runtime: {e}"))
        })?;

        let scheduler = AdmissionScheduler::new(ceiling);
        tracing::info!(
            cache_dir = %cache_dir.display(),
            ceiling = scheduler.ceiling(),
            "Job orchestrator ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    registry: JobRegistry::new(),
                    scheduler,
                    handles: HashMap::new(),
                    accepting: true,
                }),
                supervisor: ProcessSupervisor::new(prober, template),
                cache_dir,
                runtime,
            }),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    pub fn ceiling(&self) -> usize {
        self.inner.state.lock().scheduler.ceiling()
    }

    /// Artifact location for a job id.
    fn output_path_for(&self, id: JobId) -> PathBuf {
        self.inner.cache_dir.join(format!("{id}.mp4"))
    }

    /// Register a new job and admit it immediately if a slot is free.
    pub fn submit(&self, request: SubmitRequest) -> Result<JobId> {
        if request.input_url.trim().is_empty() {
            return Err(Error::Validation("input url must not be empty".into()));
        }

        let id = JobId::new();
        let output_path = self.output_path_for(id);

        let launches = {
            let mut state = self.inner.state.lock();
            if !state.accepting {
                return Err(Error::Internal("job engine is shutting down".into()));
            }
            let job = state.registry.insert(id, request, output_path);
            tracing::info!(
                job_id = %id,
                input_url = %job.input_url,
                device_id = job.device_id.as_deref().unwrap_or("-"),
                "Job submitted"
            );
            state.scheduler.enqueue(id);
            admit_locked(&mut state)
        };

        self.launch(launches);
        Ok(id)
    }

    /// Point-in-time snapshot of one job.
    pub fn status(&self, id: JobId) -> Option<Job> {
        self.inner.state.lock().registry.get(id).cloned()
    }

    /// Snapshots of all matching jobs, oldest submission first.
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        self.inner.state.lock().registry.list(filter)
    }

    /// Cancel a queued or running job.
    ///
    /// Returns `false` for unknown ids and jobs already in a terminal state;
    /// neither is an error. A running job's process is killed and its handle
    /// dropped before this returns.
    pub fn cancel(&self, id: JobId) -> bool {
        let launches = {
            let mut state = self.inner.state.lock();
            let Some(status) = state.registry.get(id).map(|j| j.status) else {
                return false;
            };

            match status {
                JobStatus::Queued => {
                    state.scheduler.remove(id);
                    state.registry.update(id, |j| j.cancel());
                    tracing::info!(job_id = %id, "Cancelled queued job");
                    Vec::new()
                }
                JobStatus::Running => {
                    state.registry.update(id, |j| j.cancel());
                    if let Some(handle) = state.handles.remove(&id) {
                        handle.kill();
                    }
                    tracing::info!(job_id = %id, "Cancelled running job");
                    admit_locked(&mut state)
                }
                _ => return false,
            }
        };

        self.launch(launches);
        true
    }

    /// Location of a completed job's artifact.
    pub fn artifact_path(&self, id: JobId) -> Result<PathBuf> {
        let state = self.inner.state.lock();
        let job = state
            .registry
            .get(id)
            .ok_or_else(|| Error::not_found("job", id))?;

        if job.status != JobStatus::Completed {
            return Err(Error::Validation(format!(
                "job {id} is {}, not completed",
                job.status
            )));
        }
        Ok(job.output_path.clone())
    }

    /// Forget a job entirely. A job that is still running is cancelled first.
    ///
    /// Idempotent; returns whether an entry was removed. The artifact on
    /// disk is left alone.
    pub fn retire(&self, id: JobId) -> bool {
        let (removed, launches) = {
            let mut state = self.inner.state.lock();
            if let Some(handle) = state.handles.remove(&id) {
                handle.kill();
            }
            state.scheduler.remove(id);
            let removed = state.registry.remove(id);
            let freed_slot = removed
                .as_ref()
                .is_some_and(|j| j.status == JobStatus::Running);
            let launches = if freed_slot {
                admit_locked(&mut state)
            } else {
                Vec::new()
            };
            (removed.is_some(), launches)
        };

        if removed {
            tracing::debug!(job_id = %id, "Job retired");
        }
        self.launch(launches);
        removed
    }

    /// Job counters plus the size of the cache directory.
    pub async fn statistics(&self) -> Result<Statistics> {
        let (total_jobs, active_jobs, completed_jobs, unique_devices) = {
            let state = self.inner.state.lock();
            let devices: HashSet<&str> = state
                .registry
                .iter()
                .filter_map(|j| j.device_id.as_deref())
                .collect();
            (
                state.registry.len(),
                state.registry.running_count(),
                state.registry.count(JobStatus::Completed),
                devices.len(),
            )
        };

        let root = self.inner.cache_dir.clone();
        let cache_size_bytes = tokio::task::spawn_blocking(move || cache::dir_size(&root))
            .await
            .map_err(|e| Error::Internal(format!("cache size task failed: {e}")))?;

        Ok(Statistics {
            cache_size_bytes,
            total_jobs,
            active_jobs,
            completed_jobs,
            unique_devices,
        })
    }

    /// Delete cached files, sparing artifacts of jobs that are not yet
    /// terminal, and retire completed jobs whose artifacts were deleted.
    ///
    /// Each file is checked against the registry right before it is removed,
    /// so jobs admitted while the walk is in progress keep their output.
    pub async fn clear_cache(&self) -> Result<CacheClearReport> {
        let root = self.inner.cache_dir.clone();
        let this = self.clone();
        let cleared = tokio::task::spawn_blocking(move || {
            cache::clear_dir(&root, |p| this.is_live_output(p))
        })
        .await
        .map_err(|e| Error::Internal(format!("cache clear task failed: {e}")))?;

        let removed: HashSet<&Path> = cleared.removed.iter().map(PathBuf::as_path).collect();
        let orphaned: Vec<JobId> = {
            let state = self.inner.state.lock();
            state
                .registry
                .iter()
                .filter(|j| j.status == JobStatus::Completed)
                .filter(|j| removed.contains(j.output_path.as_path()))
                .map(|j| j.id)
                .collect()
        };

        let jobs_retired = orphaned.into_iter().filter(|id| self.retire(*id)).count();

        let report = CacheClearReport {
            files_removed: cleared.removed.len(),
            bytes_freed: cleared.freed_bytes,
            files_kept: cleared.kept,
            jobs_retired,
        };
        tracing::info!(
            files_removed = report.files_removed,
            bytes_freed = report.bytes_freed,
            jobs_retired = report.jobs_retired,
            "Cache cleared"
        );
        Ok(report)
    }

    /// Whether `path` is the output of a job that is still queued or running.
    fn is_live_output(&self, path: &Path) -> bool {
        let Some(id) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<JobId>().ok())
        else {
            return false;
        };

        self.inner
            .state
            .lock()
            .registry
            .get(id)
            .is_some_and(|j| !j.status.is_terminal() && j.output_path == path)
    }

    /// Remove artifacts of jobs that finished longer than `retention` ago
    /// and retire those jobs.
    pub async fn sweep_expired(&self, retention: chrono::Duration) -> SweepReport {
        let cutoff = Utc::now() - retention;
        let expired: Vec<(JobId, PathBuf)> = {
            let state = self.inner.state.lock();
            state
                .registry
                .iter()
                .filter(|j| j.status.is_terminal())
                .filter(|j| j.finished_at.unwrap_or(j.submitted_at) < cutoff)
                .map(|j| (j.id, j.output_path.clone()))
                .collect()
        };

        let mut report = SweepReport::default();
        for (id, path) in expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.files_removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(job_id = %id, path = %path.display(), "Failed to remove expired artifact: {e}");
                }
            }
            if self.retire(id) {
                report.jobs_retired += 1;
            }
        }

        if report.jobs_retired > 0 {
            tracing::info!(
                jobs_retired = report.jobs_retired,
                files_removed = report.files_removed,
                "Retention sweep finished"
            );
        }
        report
    }

    /// Stop admitting work, cancel everything that has not finished and kill
    /// all running processes.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if !state.accepting {
            return;
        }
        state.accepting = false;
        state.scheduler.clear();

        let unfinished: Vec<JobId> = state
            .registry
            .iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id)
            .collect();
        for id in &unfinished {
            state.registry.update(*id, |j| j.cancel());
        }

        let killed = state.handles.len();
        for (_, handle) in state.handles.drain() {
            handle.kill();
        }

        tracing::info!(
            cancelled = unfinished.len(),
            killed,
            "Job orchestrator shut down"
        );
    }

    fn launch(&self, launches: Vec<Launch>) {
        for launch in launches {
            let this = self.clone();
            self.inner.runtime.spawn(async move {
                let Launch {
                    id,
                    input_url,
                    output_path,
                    handle,
                } = launch;

                let spec = RunSpec {
                    id,
                    input_url: &input_url,
                    output_path: &output_path,
                };
                let run = this.inner.supervisor.run(spec, &handle, &this);
                let outcome = match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::error!(job_id = %id, "Supervisor panicked");
                        Outcome::Failed(Error::Internal("supervisor panicked".into()))
                    }
                };

                this.finish(id, outcome);
            });
        }
    }

    /// Record a supervisor's terminal outcome and refill the freed slot.
    fn finish(&self, id: JobId, outcome: Outcome) {
        let launches = {
            let mut state = self.inner.state.lock();
            state.handles.remove(&id);

            match outcome {
                Outcome::Completed { size_bytes } => {
                    if state.registry.update(id, |j| j.complete(size_bytes)) {
                        tracing::info!(job_id = %id, size_bytes = ?size_bytes, "Job completed");
                    }
                }
                Outcome::Failed(e) => {
                    let message = e.to_string();
                    if state.registry.update(id, |j| j.fail(message.as_str())) {
                        tracing::warn!(job_id = %id, error = %message, "Job failed");
                    }
                }
                Outcome::Killed => {
                    state.registry.update(id, |j| j.cancel());
                }
            }

            admit_locked(&mut state)
        };

        self.launch(launches);
    }
}

impl ProgressSink for Orchestrator {
    fn duration_probed(&self, id: JobId, secs: f64) {
        self.inner
            .state
            .lock()
            .registry
            .update(id, |j| j.record_duration(secs));
    }

    fn progress(&self, id: JobId, sample: ProgressSample) {
        self.inner
            .state
            .lock()
            .registry
            .update(id, |j| j.record_progress(sample.progress, sample.speed));
    }
}

/// Run an admission pass and register handles for everything admitted.
fn admit_locked(state: &mut EngineState) -> Vec<Launch> {
    if !state.accepting {
        return Vec::new();
    }

    let admitted = state.scheduler.admit(&mut state.registry);
    let mut launches = Vec::with_capacity(admitted.len());

    for id in admitted {
        let Some(job) = state.registry.get(id) else {
            continue;
        };
        let handle = ProcessHandle::new();
        tracing::info!(job_id = %id, "Job admitted");
        launches.push(Launch {
            id,
            input_url: job.input_url.clone(),
            output_path: job.output_path.clone(),
            handle: handle.clone(),
        });
        state.handles.insert(id, handle);
    }

    launches
}
