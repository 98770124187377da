//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and then
//! overridden from the environment. Every section defaults sensibly so a
//! completely empty `{}` file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub jobs: JobsConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override fields from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored so a typo in one variable
    /// never prevents startup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HLSFORGE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("HLSFORGE_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid HLSFORGE_PORT '{port}'"),
            }
        }
        if let Some(max) = lookup("MAX_CONCURRENT_JOBS") {
            match max.parse() {
                Ok(n) => self.jobs.max_concurrent_jobs = n,
                Err(_) => tracing::warn!("Ignoring invalid MAX_CONCURRENT_JOBS '{max}'"),
            }
        }
        if let Some(dir) = lookup("CACHE_DIR") {
            self.jobs.cache_dir = PathBuf::from(dir);
        }
        if let Some(hw) = lookup("HW_ACCEL") {
            match hw.parse() {
                Ok(accel) => self.jobs.hw_accel = accel,
                Err(e) => tracing::warn!("Ignoring HW_ACCEL: {e}"),
            }
        }
        if let Some(hours) = lookup("RETENTION_HOURS") {
            match hours.parse() {
                Ok(h) => self.jobs.retention_hours = h,
                Err(_) => tracing::warn!("Ignoring invalid RETENTION_HOURS '{hours}'"),
            }
        }
        if let Some(secs) = lookup("CLEANUP_INTERVAL_SECS") {
            match secs.parse() {
                Ok(s) => self.jobs.cleanup_interval_secs = s,
                Err(_) => tracing::warn!("Ignoring invalid CLEANUP_INTERVAL_SECS '{secs}'"),
            }
        }
        if let Some(key) = lookup("API_KEY").filter(|k| !k.is_empty()) {
            self.auth.api_key = Some(key);
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.tools.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("FFPROBE_PATH") {
            self.tools.ffprobe_path = Some(PathBuf::from(path));
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.jobs.max_concurrent_jobs == 0 {
            warnings.push("jobs.max_concurrent_jobs is 0; using 1".into());
        }

        if self.jobs.retention_hours == 0 {
            warnings.push(
                "jobs.retention_hours is 0; artifacts are removed on the next sweep".into(),
            );
        }

        if self.jobs.cleanup_interval_secs == 0 {
            warnings.push("jobs.cleanup_interval_secs is 0; using 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Authentication settings. Auth is enforced only when `api_key` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

impl AuthConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Job engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Admission ceiling: maximum number of jobs running at once.
    pub max_concurrent_jobs: usize,
    /// Root directory for produced artifacts.
    pub cache_dir: PathBuf,
    /// Combiner command template selection.
    pub hw_accel: HwAccel,
    /// Age after which terminal jobs and their artifacts are swept.
    pub retention_hours: u64,
    /// How often the retention sweep runs.
    pub cleanup_interval_secs: u64,
}

impl JobsConfig {
    /// The admission ceiling, never less than one.
    pub fn ceiling(&self) -> usize {
        self.max_concurrent_jobs.max(1)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            cache_dir: PathBuf::from("./cache"),
            hw_accel: HwAccel::None,
            retention_hours: 24,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// HwAccel
// ---------------------------------------------------------------------------

/// Hardware capability profile used to pick the combiner command template.
///
/// `None` stream-copies the source; every other variant re-encodes video with
/// the corresponding hardware H.264 encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    #[default]
    #[serde(alias = "software")]
    None,
    Nvenc,
    Vaapi,
    Qsv,
    Videotoolbox,
}

impl HwAccel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HwAccel::None => "none",
            HwAccel::Nvenc => "nvenc",
            HwAccel::Vaapi => "vaapi",
            HwAccel::Qsv => "qsv",
            HwAccel::Videotoolbox => "videotoolbox",
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HwAccel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "software" | "false" => Ok(HwAccel::None),
            "nvenc" => Ok(HwAccel::Nvenc),
            "vaapi" => Ok(HwAccel::Vaapi),
            "qsv" => Ok(HwAccel::Qsv),
            "videotoolbox" | "true" => Ok(HwAccel::Videotoolbox),
            other => Err(Error::Validation(format!(
                "'{other}' is not a recognized hw_accel (valid: none, nvenc, vaapi, qsv, videotoolbox)"
            ))),
        }
    }
}
