//! Application context shared by all route handlers via Axum state.

use std::sync::Arc;

use hf_av::{FfmpegTemplate, FfprobeProber, ToolRegistry};
use hf_core::config::Config;
use hf_jobs::Orchestrator;

/// Cheaply cloneable handle to everything a request needs.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// The job engine.
    pub orchestrator: Orchestrator,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
}

impl AppContext {
    pub fn new(config: Config, tools: Arc<ToolRegistry>, orchestrator: Orchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            tools,
        }
    }
}

/// Build the production job engine: ffprobe for durations, ffmpeg with the
/// configured hardware profile for combining.
///
/// Fails if either tool is missing or the cache directory cannot be created.
pub fn build_orchestrator(config: &Config, tools: &ToolRegistry) -> hf_core::Result<Orchestrator> {
    let prober = FfprobeProber::from_registry(tools)?;
    let template = FfmpegTemplate::new(tools.require("ffmpeg")?, config.jobs.hw_accel);

    Orchestrator::new(
        config.jobs.cache_dir.clone(),
        config.jobs.ceiling(),
        Arc::new(prober),
        Arc::new(template),
    )
}
