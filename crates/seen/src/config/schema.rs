use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Root holding the per-stage directories.
    pub storage_directory: String,
    /// SQLite file; defaults to the per-user data directory.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_worker_count() -> usize {
    crate::worker::DEFAULT_WORKER_COUNT
}

fn default_queue_capacity() -> usize {
    crate::queue::DEFAULT_CAPACITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_prep_script")]
    pub prep_script: String,
    #[serde(default = "default_blur_script")]
    pub blur_script: String,
    /// Passed to the frame sampler as its third argument.
    #[serde(default = "default_frame_sample_rate")]
    pub frame_sample_rate: u32,
    /// Per-invocation deadline. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verify_outputs: bool,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_prep_script() -> String {
    "processing/scripts/prep.py".to_string()
}

fn default_blur_script() -> String {
    "processing/scripts/blur.py".to_string()
}

fn default_frame_sample_rate() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            prep_script: default_prep_script(),
            blur_script: default_blur_script(),
            frame_sample_rate: default_frame_sample_rate(),
            timeout_secs: default_timeout_secs(),
            verify_outputs: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
        }
    }
}
