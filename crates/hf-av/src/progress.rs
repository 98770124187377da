//! Combiner progress parsing.
//!
//! ffmpeg reports its position as periodic stats lines on stderr:
//!
//! ```text
//! frame= 1200 fps=240 q=-1.0 size=   10240kB time=00:00:50.04 bitrate=1676.4kbits/s speed=10.0x
//! ```
//!
//! [`parse_progress_line`] turns one such line into a [`ProgressSample`].

use std::sync::LazyLock;

use regex::Regex;

/// Highest percentage reported from a mid-stream sample. 100 is reserved for
/// a successful exit.
pub const MAX_RUNNING_PROGRESS: f64 = 99.9;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d{2}):(\d{2})").expect("valid time regex"));

static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)x").expect("valid speed regex"));

/// Information extracted from one stats line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Percentage in `[0, MAX_RUNNING_PROGRESS]`, present only when the
    /// total duration is known.
    pub progress: Option<f64>,
    /// Processing speed as a multiple of realtime.
    pub speed: Option<f64>,
}

/// Parse one line of combiner output.
///
/// `total_duration` is the probed source duration in seconds. Only lines
/// carrying a `time=` position count as stats lines. Returns `None` when the
/// line carries nothing usable; never fails.
pub fn parse_progress_line(line: &str, total_duration: Option<f64>) -> Option<ProgressSample> {
    let elapsed = parse_elapsed_secs(line)?;
    let speed = SPEED_RE
        .captures(line)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|s| s.is_finite());

    let progress = match total_duration {
        Some(total) if total > 0.0 && total.is_finite() => {
            Some((elapsed / total * 100.0).clamp(0.0, MAX_RUNNING_PROGRESS))
        }
        _ => None,
    };

    if progress.is_none() && speed.is_none() {
        return None;
    }

    Some(ProgressSample { progress, speed })
}

/// Extract `time=HH:MM:SS` as whole seconds. Fractional seconds are ignored.
///
/// An hours field too large to represent yields `None`.
fn parse_elapsed_secs(line: &str) -> Option<f64> {
    let caps = TIME_RE.captures(line)?;
    let hours: u64 = caps[1].parse().ok()?;
    let minutes: u64 = caps[2].parse().ok()?;
    let seconds: u64 = caps[3].parse().ok()?;
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)?;
    Some(total as f64)
}
