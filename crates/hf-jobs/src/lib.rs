//! # hf-jobs
//!
//! The job engine: turns submissions into supervised combiner runs under a
//! concurrency ceiling.
//!
//! - [`job`] -- the [`Job`] record and its lifecycle state machine.
//! - [`registry`] -- the in-memory job table.
//! - [`scheduler`] -- FIFO admission under a ceiling.
//! - [`supervisor`] -- probe + combine for one job, with live progress and
//!   hard cancellation.
//! - [`orchestrator`] -- the façade tying the above together.
//! - [`retention`] -- background sweep of expired artifacts.

pub mod cache;
pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod retention;
pub mod scheduler;
pub mod supervisor;

pub use job::{Job, JobStatus, SubmitRequest};
pub use orchestrator::{CacheClearReport, Orchestrator, Statistics, SweepReport};
pub use registry::{JobFilter, JobRegistry};
pub use retention::run_retention_sweep;
pub use scheduler::AdmissionScheduler;
pub use supervisor::{Outcome, ProcessHandle, ProcessSupervisor, ProgressSink, RunSpec};
