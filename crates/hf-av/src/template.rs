//! Combiner command templates.
//!
//! The supervisor never decides how ffmpeg is invoked. It asks an injected
//! [`CombineTemplate`] for a [`CommandLine`] and runs whatever comes back,
//! which keeps argument construction testable without spawning anything.

use std::path::{Path, PathBuf};

use hf_core::config::HwAccel;

/// What the template needs to know about a job.
#[derive(Debug, Clone, Copy)]
pub struct CombineRequest<'a> {
    pub input_url: &'a str,
    pub output_path: &'a Path,
}

/// A fully resolved invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Strategy turning a job into the combiner command line.
pub trait CombineTemplate: Send + Sync {
    fn command(&self, request: &CombineRequest<'_>) -> CommandLine;
}

impl<F> CombineTemplate for F
where
    F: Fn(&CombineRequest<'_>) -> CommandLine + Send + Sync,
{
    fn command(&self, request: &CombineRequest<'_>) -> CommandLine {
        self(request)
    }
}

/// The production template: ffmpeg with arguments chosen by [`HwAccel`].
#[derive(Debug, Clone)]
pub struct FfmpegTemplate {
    ffmpeg: PathBuf,
    hw_accel: HwAccel,
}

impl FfmpegTemplate {
    pub fn new(ffmpeg: impl Into<PathBuf>, hw_accel: HwAccel) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            hw_accel,
        }
    }
}

impl CombineTemplate for FfmpegTemplate {
    fn command(&self, request: &CombineRequest<'_>) -> CommandLine {
        CommandLine::new(
            self.ffmpeg.clone(),
            combine_args(self.hw_accel, request.input_url, request.output_path),
        )
    }
}

/// Resolve a hardware profile to the `-hwaccel` flags (placed before `-i`)
/// and the H.264 encoder name.
fn resolve_hw_accel(hw_accel: HwAccel) -> Option<(&'static [&'static str], &'static str)> {
    match hw_accel {
        HwAccel::None => None,
        HwAccel::Videotoolbox => Some((&["-hwaccel", "videotoolbox"], "h264_videotoolbox")),
        HwAccel::Nvenc => Some((&["-hwaccel", "cuda"], "h264_nvenc")),
        HwAccel::Vaapi => Some((
            &["-hwaccel", "vaapi", "-hwaccel_output_format", "vaapi"],
            "h264_vaapi",
        )),
        HwAccel::Qsv => Some((&["-hwaccel", "qsv"], "h264_qsv")),
    }
}

/// Build the ffmpeg argument list for combining `input_url` into a single
/// MP4 at `output_path`.
///
/// Without hardware acceleration the streams are copied as-is. Hardware
/// profiles re-encode video with bitrate targeting since those encoders do
/// not support CRF.
pub fn combine_args(hw_accel: HwAccel, input_url: &str, output_path: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-nostdin", "-hide_banner"]
        .into_iter()
        .map(String::from)
        .collect();

    let hw = resolve_hw_accel(hw_accel);
    if let Some((hwaccel_args, _)) = hw {
        args.extend(hwaccel_args.iter().map(|s| s.to_string()));
    }

    args.extend(["-i".to_string(), input_url.to_string()]);

    match hw {
        None => {
            args.extend(["-c", "copy", "-bsf:a", "aac_adtstoasc"].map(String::from));
        }
        Some((_, encoder)) => {
            args.extend(
                [
                    "-c:v", encoder, "-b:v", "5M", "-maxrate", "8M", "-bufsize", "16M", "-c:a",
                    "aac", "-b:a", "192k", "-ac", "2",
                ]
                .map(String::from),
            );
        }
    }

    args.extend(["-movflags", "+faststart", "-f", "mp4"].map(String::from));
    args.push(output_path.to_string_lossy().to_string());
    args
}
