//! # hf-av
//!
//! External media tool plumbing for the hlsforge job engine.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder for running or
//!   spawning external processes.
//! - **Duration probing** ([`DurationProber`], [`FfprobeProber`]).
//! - **Combine templates** ([`CombineTemplate`], [`FfmpegTemplate`]) -- the
//!   injected strategy that turns a job into a combiner command line.
//! - **Progress parsing** ([`parse_progress_line`]) and the
//!   [`StatsLineCodec`] that splits ffmpeg's `\r`-terminated stats output.

pub mod codec;
pub mod command;
pub mod probe;
pub mod progress;
pub mod template;
pub mod tools;

// ---- Re-exports for convenience ----

pub use codec::StatsLineCodec;
pub use command::{ToolCommand, ToolOutput};
pub use probe::{DurationProber, FfprobeProber};
pub use progress::{parse_progress_line, ProgressSample, MAX_RUNNING_PROGRESS};
pub use template::{combine_args, CombineRequest, CombineTemplate, CommandLine, FfmpegTemplate};
pub use tools::{ToolInfo, ToolRegistry};
