//! Per-job process supervision.
//!
//! A [`ProcessSupervisor`] drives one job through its two external steps:
//! probe the source duration, then run the combiner while feeding its stderr
//! through [`parse_progress_line`]. Live information is pushed to a
//! [`ProgressSink`]; the terminal result is returned as an [`Outcome`] so the
//! caller records it exactly once.

use std::collections::VecDeque;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::process::Child;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use hf_av::{
    parse_progress_line, CombineRequest, CombineTemplate, DurationProber, ProgressSample,
    StatsLineCodec, ToolCommand,
};
use hf_core::JobId;

/// Number of trailing non-stats stderr lines kept for failure messages.
const STDERR_TAIL_LINES: usize = 5;

/// How often an exiting combiner is checked for reaping.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Receiver for live updates from a running job.
pub trait ProgressSink: Send + Sync {
    /// The source duration was probed successfully.
    fn duration_probed(&self, id: JobId, secs: f64);

    /// The combiner reported a stats line.
    fn progress(&self, id: JobId, sample: ProgressSample);
}

/// How a supervised run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The combiner exited with status 0. `size_bytes` is `None` when the
    /// artifact could not be stat'ed.
    Completed { size_bytes: Option<u64> },
    /// Probe or combine failed. Carries `ProbeFailed` or `CombineFailed`.
    Failed(hf_core::Error),
    /// The run was stopped through its [`ProcessHandle`].
    Killed,
}

/// Kill switch for one running job.
///
/// Cloning shares the switch. Once the combiner is spawned the handle owns
/// the child, so [`kill`](Self::kill) delivers SIGKILL before it returns.
/// Reaping goes through the same lock, which keeps a kill from ever reaching
/// a recycled pid. Killing is idempotent and never waits for the reap.
#[derive(Debug, Clone, Default)]
pub struct ProcessHandle {
    token: CancellationToken,
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill whatever the job is currently running.
    pub fn kill(&self) {
        let mut slot = self.child.lock();
        self.token.cancel();
        if let Some(child) = slot.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(pid = ?child.id(), "Combiner already gone: {e}");
            }
        }
    }

    pub fn is_killed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// OS process id of the combiner, while it is attached and unreaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.lock().as_ref().and_then(Child::id)
    }

    /// Take ownership of a freshly spawned combiner. A kill that raced the
    /// spawn is applied immediately.
    fn attach(&self, mut child: Child) {
        let mut slot = self.child.lock();
        if self.token.is_cancelled() {
            let _ = child.start_kill();
        }
        *slot = Some(child);
    }

    /// Reap the combiner if it has exited.
    fn try_reap(&self) -> std::io::Result<Option<ExitStatus>> {
        let mut slot = self.child.lock();
        let Some(child) = slot.as_mut() else {
            return Err(std::io::Error::other("no combiner attached"));
        };
        let status = child.try_wait()?;
        if status.is_some() {
            *slot = None;
        }
        Ok(status)
    }

    /// Wait for the combiner to exit and reap it.
    async fn reap(&self) -> std::io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.try_reap()? {
                return Ok(status);
            }
            tokio::time::sleep(REAP_POLL_INTERVAL).await;
        }
    }
}

/// What the supervisor needs to know about a job.
#[derive(Debug, Clone, Copy)]
pub struct RunSpec<'a> {
    pub id: JobId,
    pub input_url: &'a str,
    pub output_path: &'a Path,
}

/// Runs the probe and combiner for admitted jobs.
#[derive(Clone)]
pub struct ProcessSupervisor {
    prober: Arc<dyn DurationProber>,
    template: Arc<dyn CombineTemplate>,
}

impl ProcessSupervisor {
    pub fn new(prober: Arc<dyn DurationProber>, template: Arc<dyn CombineTemplate>) -> Self {
        Self { prober, template }
    }

    /// Supervise one job to completion.
    ///
    /// Never returns an error: every failure becomes [`Outcome::Failed`].
    pub async fn run(
        &self,
        spec: RunSpec<'_>,
        handle: &ProcessHandle,
        sink: &dyn ProgressSink,
    ) -> Outcome {
        let token = &handle.token;

        let probed = tokio::select! {
            biased;
            _ = token.cancelled() => return Outcome::Killed,
            result = self.prober.probe_duration(spec.input_url) => result,
        };

        let duration = match probed {
            Ok(secs) => secs,
            Err(e) => {
                tracing::warn!(job_id = %spec.id, error = %e, "Duration probe failed");
                return Outcome::Failed(as_probe_failure(e));
            }
        };

        tracing::debug!(job_id = %spec.id, duration_secs = duration, "Probed source duration");
        sink.duration_probed(spec.id, duration);

        if token.is_cancelled() {
            return Outcome::Killed;
        }

        let line = self.template.command(&CombineRequest {
            input_url: spec.input_url,
            output_path: spec.output_path,
        });

        let mut child = match ToolCommand::new(line.program)
            .args(line.args)
            .spawn_with_stderr()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(job_id = %spec.id, error = %e, "Failed to launch combiner");
                return Outcome::Failed(hf_core::Error::CombineFailed(e.to_string()));
            }
        };

        tracing::info!(job_id = %spec.id, pid = ?child.id(), "Combiner started");

        let stderr = child.stderr.take();
        handle.attach(child);

        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        if let Some(stderr) = stderr {
            let mut lines = FramedRead::new(stderr, StatsLineCodec::new());
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        reap_killed(spec.id, handle).await;
                        return Outcome::Killed;
                    }
                    next = lines.next() => match next {
                        Some(Ok(text)) => match parse_progress_line(&text, Some(duration)) {
                            Some(sample) => sink.progress(spec.id, sample),
                            None => {
                                if tail.len() == STDERR_TAIL_LINES {
                                    tail.pop_front();
                                }
                                tail.push_back(text);
                            }
                        },
                        Some(Err(e)) => {
                            tracing::debug!(job_id = %spec.id, "Stopped reading combiner stderr: {e}");
                            break;
                        }
                        None => break,
                    },
                }
            }
        }

        let status = handle.reap().await;
        if token.is_cancelled() {
            tracing::info!(job_id = %spec.id, "Combiner killed");
            return Outcome::Killed;
        }

        match status {
            Ok(status) if status.success() => {
                let size_bytes = match tokio::fs::metadata(spec.output_path).await {
                    Ok(meta) => Some(meta.len()),
                    Err(e) => {
                        tracing::warn!(
                            job_id = %spec.id,
                            path = %spec.output_path.display(),
                            "Failed to stat artifact: {e}"
                        );
                        None
                    }
                };
                Outcome::Completed { size_bytes }
            }
            Ok(status) => {
                let detail = Vec::from(tail).join(" | ");
                let message = if detail.is_empty() {
                    format!("combiner exited with {status}")
                } else {
                    format!("combiner exited with {status}: {detail}")
                };
                Outcome::Failed(hf_core::Error::CombineFailed(message))
            }
            Err(e) => Outcome::Failed(hf_core::Error::CombineFailed(format!(
                "failed waiting for combiner: {e}"
            ))),
        }
    }
}

fn as_probe_failure(e: hf_core::Error) -> hf_core::Error {
    match e {
        hf_core::Error::ProbeFailed(_) => e,
        other => hf_core::Error::ProbeFailed(other.to_string()),
    }
}

/// Reap a combiner that was already sent SIGKILL through its handle.
async fn reap_killed(id: JobId, handle: &ProcessHandle) {
    if let Err(e) = handle.reap().await {
        tracing::debug!(job_id = %id, "Failed to reap combiner: {e}");
    }
    tracing::info!(job_id = %id, "Combiner killed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use hf_av::CommandLine;

    struct FixedProber(hf_core::Result<f64>);

    #[async_trait]
    impl DurationProber for FixedProber {
        async fn probe_duration(&self, _input: &str) -> hf_core::Result<f64> {
            match &self.0 {
                Ok(secs) => Ok(*secs),
                Err(e) => Err(hf_core::Error::Internal(e.to_string())),
            }
        }
    }

    /// Runs `sh -c <script> <output_path>`; the script sees the artifact
    /// path as `$0`.
    struct ShTemplate {
        script: &'static str,
        calls: AtomicUsize,
    }

    impl ShTemplate {
        fn new(script: &'static str) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CombineTemplate for ShTemplate {
        fn command(&self, req: &CombineRequest<'_>) -> CommandLine {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CommandLine::new(
                "sh",
                [
                    "-c".to_string(),
                    self.script.to_string(),
                    req.output_path.to_string_lossy().to_string(),
                ],
            )
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        durations: Mutex<Vec<f64>>,
        samples: Mutex<Vec<ProgressSample>>,
    }

    impl ProgressSink for RecordingSink {
        fn duration_probed(&self, _id: JobId, secs: f64) {
            self.durations.lock().push(secs);
        }

        fn progress(&self, _id: JobId, sample: ProgressSample) {
            self.samples.lock().push(sample);
        }
    }

    fn supervisor(
        prober: FixedProber,
        template: Arc<ShTemplate>,
    ) -> ProcessSupervisor {
        ProcessSupervisor::new(Arc::new(prober), template)
    }

    #[tokio::test]
    async fn success_reports_progress_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.mp4");
        let template = Arc::new(ShTemplate::new(
            "printf 'frame=1 time=00:00:05.00 speed=2.0x\\r' >&2; printf 'abcd' > \"$0\"",
        ));
        let sup = supervisor(FixedProber(Ok(10.0)), template.clone());
        let sink = RecordingSink::default();

        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "http://m/master.m3u8",
                    output_path: &out,
                },
                &ProcessHandle::new(),
                &sink,
            )
            .await;

        assert!(matches!(outcome, Outcome::Completed { size_bytes: Some(4) }), "{outcome:?}");
        assert_eq!(*sink.durations.lock(), vec![10.0]);
        let samples = sink.samples.lock();
        assert_eq!(samples.len(), 1);
        assert!((samples[0].progress.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(samples[0].speed, Some(2.0));
    }

    #[tokio::test]
    async fn probe_failure_never_starts_combiner() {
        let dir = tempfile::tempdir().unwrap();
        let template = Arc::new(ShTemplate::new("exit 0"));
        let sup = supervisor(
            FixedProber(Err(hf_core::Error::Internal("no such stream".into()))),
            template.clone(),
        );
        let sink = RecordingSink::default();

        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "bad",
                    output_path: &dir.path().join("x.mp4"),
                },
                &ProcessHandle::new(),
                &sink,
            )
            .await;

        match outcome {
            Outcome::Failed(e) => assert!(e.to_string().starts_with("ProbeFailed"), "{e}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(template.calls.load(Ordering::SeqCst), 0);
        assert!(sink.durations.lock().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_combine_failure_with_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let template = Arc::new(ShTemplate::new("echo 'Invalid data found' >&2; exit 3"));
        let sup = supervisor(FixedProber(Ok(10.0)), template);

        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &dir.path().join("x.mp4"),
                },
                &ProcessHandle::new(),
                &RecordingSink::default(),
            )
            .await;

        match outcome {
            Outcome::Failed(hf_core::Error::CombineFailed(msg)) => {
                assert!(msg.contains("Invalid data found"), "{msg}");
            }
            other => panic!("expected combine failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_failure_is_combine_failure() {
        struct Missing;
        impl CombineTemplate for Missing {
            fn command(&self, _req: &CombineRequest<'_>) -> CommandLine {
                CommandLine::new("/nonexistent/ffmpeg_xyz", Vec::<String>::new())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let sup = ProcessSupervisor::new(Arc::new(FixedProber(Ok(1.0))), Arc::new(Missing));
        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &dir.path().join("x.mp4"),
                },
                &ProcessHandle::new(),
                &RecordingSink::default(),
            )
            .await;

        assert!(matches!(outcome, Outcome::Failed(hf_core::Error::CombineFailed(_))));
    }

    #[tokio::test]
    async fn missing_artifact_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let template = Arc::new(ShTemplate::new("exit 0"));
        let sup = supervisor(FixedProber(Ok(1.0)), template);

        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &dir.path().join("never-written.mp4"),
                },
                &ProcessHandle::new(),
                &RecordingSink::default(),
            )
            .await;

        assert!(matches!(outcome, Outcome::Completed { size_bytes: None }));
    }

    #[tokio::test]
    async fn kill_stops_running_combiner() {
        let dir = tempfile::tempdir().unwrap();
        let template = Arc::new(ShTemplate::new("sleep 30"));
        let sup = supervisor(FixedProber(Ok(30.0)), template);
        let handle = ProcessHandle::new();

        let killer = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            killer.kill();
            killer.kill();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            sup.run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &dir.path().join("x.mp4"),
                },
                &handle,
                &RecordingSink::default(),
            ),
        )
        .await
        .expect("kill must end the run promptly");

        assert!(matches!(outcome, Outcome::Killed));
        assert!(handle.is_killed());
    }

    /// Blocks the calling thread, without yielding to the runtime, until
    /// `pid` is dead or a zombie. Gives up after two seconds.
    fn wait_signalled(pid: u32) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let dead = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => stat
                    .rsplit_once(')')
                    .and_then(|(_, rest)| rest.trim_start().chars().next())
                    == Some('Z'),
                Err(_) => true,
            };
            if dead || std::time::Instant::now() > deadline {
                return dead;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[tokio::test]
    async fn kill_signals_combiner_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.mp4");
        let sup = supervisor(FixedProber(Ok(30.0)), Arc::new(ShTemplate::new("exec sleep 30")));
        let handle = ProcessHandle::new();

        let task = {
            let handle = handle.clone();
            tokio::spawn(async move {
                let spec = RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &out,
                };
                sup.run(spec, &handle, &RecordingSink::default()).await
            })
        };

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        let pid = loop {
            if let Some(pid) = handle.pid() {
                break pid;
            }
            assert!(tokio::time::Instant::now() < deadline, "combiner never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        // Current-thread runtime: the supervisor task cannot run until we
        // await, so only `kill` itself can have delivered the signal.
        handle.kill();
        assert!(wait_signalled(pid), "pid {pid} still alive after kill returned");

        let outcome = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("run ends after kill")
            .unwrap();
        assert!(matches!(outcome, Outcome::Killed));
        assert_eq!(handle.pid(), None);
    }

    #[tokio::test]
    async fn killed_before_start_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let template = Arc::new(ShTemplate::new("exit 0"));
        let sup = supervisor(FixedProber(Ok(1.0)), template.clone());
        let handle = ProcessHandle::new();
        handle.kill();

        let outcome = sup
            .run(
                RunSpec {
                    id: JobId::new(),
                    input_url: "in",
                    output_path: &dir.path().join("x.mp4"),
                },
                &handle,
                &RecordingSink::default(),
            )
            .await;

        assert!(matches!(outcome, Outcome::Killed));
        assert_eq!(template.calls.load(Ordering::SeqCst), 0);
    }
}
