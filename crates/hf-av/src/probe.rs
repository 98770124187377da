//! Source duration probing.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Reports the total duration of a source, in seconds.
#[async_trait]
pub trait DurationProber: Send + Sync {
    /// Probe `input` and return its duration.
    ///
    /// Any failure (launch error, non-zero exit, unusable output) is reported
    /// as [`hf_core::Error::ProbeFailed`].
    async fn probe_duration(&self, input: &str) -> hf_core::Result<f64>;
}

/// [`DurationProber`] backed by `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }

    /// Build a prober from the discovered `ffprobe`.
    pub fn from_registry(tools: &ToolRegistry) -> hf_core::Result<Self> {
        Ok(Self::new(tools.require("ffprobe")?))
    }
}

#[async_trait]
impl DurationProber for FfprobeProber {
    async fn probe_duration(&self, input: &str) -> hf_core::Result<f64> {
        let output = ToolCommand::new(self.ffprobe.clone())
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .execute()
            .await
            .map_err(|e| hf_core::Error::ProbeFailed(e.to_string()))?;

        parse_duration_output(&output.stdout)
    }
}

/// Parse the bare duration ffprobe prints with `nokey=1`.
///
/// Live or malformed sources report `N/A`, which is a probe failure.
pub fn parse_duration_output(stdout: &str) -> hf_core::Result<f64> {
    let value = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| hf_core::Error::ProbeFailed("ffprobe printed no duration".into()))?;

    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(hf_core::Error::ProbeFailed(format!(
            "unusable duration '{value}'"
        ))),
    }
}
